#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

use std::collections::{BTreeMap, BTreeSet};

use crate::{logs::ParsedLog, store::ReportStore};

/// Run-wide accumulations that every student contributes to: the maximum
/// attainable points per work and the union of known question titles.
/// Built per student, merged into the store once at the end of the batch
/// so the monotonic collections are never mutated from arbitrary call
/// sites.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Accumulator {
    /// Work name → highest `possible` value observed so far
    available: BTreeMap<String, f64>,
    /// Question titles observed so far
    questions: BTreeSet<String>,
}

impl Accumulator {
    /// Records one parsed log's contribution: raises the ceiling for
    /// `work` if this log attainable total is higher, and adds its
    /// question titles.
    pub fn observe(&mut self, work: &str, parsed: &ParsedLog) {
        let ceiling = self.available.entry(work.to_string()).or_insert(0.0);
        if parsed.score.possible > *ceiling {
            *ceiling = parsed.score.possible;
        }

        self.questions.extend(parsed.results.keys().cloned());
    }

    /// Folds another accumulator into this one (max per work, union of
    /// questions).
    pub fn absorb(&mut self, other: Accumulator) {
        for (work, ceiling) in other.available {
            let slot = self.available.entry(work).or_insert(0.0);
            if ceiling > *slot {
                *slot = ceiling;
            }
        }

        self.questions.extend(other.questions);
    }

    /// Merges the accumulated values into the persisted store. `available`
    /// only ever rises and `questions` only ever grows.
    pub fn merge_into(self, store: &mut ReportStore) {
        for (work, ceiling) in self.available {
            let slot = store.available.entry(work).or_insert(0.0);
            if ceiling > *slot {
                *slot = ceiling;
            }
        }

        store.questions.extend(self.questions);
    }
}

/// One student's grades and details as built up over a run.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Aggregation {
    /// Work name → points earned
    pub grades:  BTreeMap<String, f64>,
    /// Work name → question title → pass/fail
    pub details: BTreeMap<String, BTreeMap<String, bool>>,
}

/// Folds parsed logs for one student into an [`Aggregation`] plus that
/// student's [`Accumulator`] contribution.
pub struct Aggregator<'w> {
    /// The configured work identifiers; anything else is ignored
    works:       &'w [String],
    /// The per-student fold so far
    tally:       Aggregation,
    /// This student's contribution to the run-wide accumulations
    accumulator: Accumulator,
}

impl<'w> Aggregator<'w> {
    /// Creates an empty aggregator over the configured work list.
    pub fn new(works: &'w [String]) -> Self {
        Self {
            works,
            tally: Aggregation::default(),
            accumulator: Accumulator::default(),
        }
    }

    /// Folds one work's parsed log in. The attainable ceiling and
    /// question titles are always observed; grades and details are only
    /// recorded for configured works, which guards against malformed
    /// manifests.
    pub fn fold(&mut self, work: &str, parsed: ParsedLog) {
        self.accumulator.observe(work, &parsed);

        if !self.works.iter().any(|known| known == work) {
            return;
        }

        self.tally.grades.insert(work.to_string(), parsed.score.earned);
        self.tally.details.insert(work.to_string(), parsed.results);
    }

    /// Splits the aggregator into the student fold and the run-wide
    /// contribution.
    pub fn into_parts(self) -> (Aggregation, Accumulator) {
        (self.tally, self.accumulator)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::logs::{ParsedLog, Score};

    /// builds a parsed log with one passing question
    fn parsed(possible: f64, question: &str) -> ParsedLog {
        ParsedLog {
            score:   Score::new(possible / 2.0, possible),
            results: BTreeMap::from([(question.to_string(), true)]),
        }
    }

    #[test]
    fn ceiling_never_drops() {
        let mut accumulator = Accumulator::default();
        accumulator.observe("main", &parsed(20.0, "Q1"));
        accumulator.observe("main", &parsed(10.0, "Q2"));

        let mut store = ReportStore::empty();
        accumulator.merge_into(&mut store);

        assert_eq!(store.available.get("main"), Some(&20.0));
        assert!(store.questions.contains("Q1") && store.questions.contains("Q2"));
    }

    #[test]
    fn unconfigured_work_is_not_graded() {
        let works = vec!["main".to_string()];
        let mut aggregator = Aggregator::new(&works);
        aggregator.fold("bonus", parsed(5.0, "Q1"));

        let (tally, _) = aggregator.into_parts();
        assert!(tally.grades.is_empty());
        assert!(tally.details.is_empty());
    }
}
