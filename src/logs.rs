#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

use std::{collections::BTreeMap, fmt::Display};

use serde::{Deserialize, Serialize};

/// Token that introduces the summary score line in an autograder log.
const SUMMARY_TOKEN: &str = "Points: ";

/// Marker prefix for a passing question line.
const PASS_MARKER: char = '✅';

/// Marker prefix for a failing question line.
const FAIL_MARKER: char = '❌';

peg::parser! {
    /// includes the grammar for the score fragments an autograder log
    /// contains.
    pub grammar scores() for str {
        /// matches spaces and tabs between tokens
        rule ws() = quiet!{[' ' | '\t']+}

        /// matches a non-negative number with an optional decimal part
        rule number() -> f64
            = n:$(['0'..='9']+ ("." ['0'..='9']*)?) {? n.parse().or(Err("number")) }

        /// parses the `earned/possible` fraction that follows the summary
        /// token; anything after the denominator (footers, trailing
        /// newlines) is tolerated and discarded
        pub rule score_fraction() -> (f64, f64)
            = ws()? earned:number() ws()? "/" ws()? possible:number() [_]*
            { (earned, possible) }
    }
}

/// A two-part fraction score: points earned out of points possible.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Score {
    /// The points the student earned
    pub earned:   f64,
    /// The maximum points the log says were attainable
    pub possible: f64,
}

impl Score {
    /// Creates a new score -
    /// * `earned` - the points earned
    /// * `possible` - the maximum points attainable
    pub fn new(earned: f64, possible: f64) -> Self {
        Self { earned, possible }
    }
}

impl Display for Score {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.earned, self.possible)
    }
}

/// The structured contents of one autograder log: the summary score and
/// the per-question pass/fail results that precede it.
#[derive(Clone, Debug, PartialEq)]
pub struct ParsedLog {
    /// The summary score from the last `Points: ` line
    pub score:   Score,
    /// Question title → whether the question passed
    pub results: BTreeMap<String, bool>,
}

/// Ways a log can fail to yield a score. Either way the caller records no
/// grade for that work and moves on.
#[derive(thiserror::Error, Debug, PartialEq)]
pub enum LogError {
    /// The text contains no `Points: ` summary line at all
    #[error("log has no `Points: ` summary line")]
    MissingSummary,
    /// A summary line was found but the fraction after it did not parse
    #[error("could not read a score fraction from `{0}`")]
    UnreadableScore(String),
}

/// Parses the raw text of one autograder log.
///
/// The *last* `Points: ` occurrence wins since some logs repeat the token
/// in footers. Everything before it is scanned line by line for ✅/❌
/// markers; unrecognized lines are ignored.
pub fn parse_log(text: &str) -> Result<ParsedLog, LogError> {
    let at = text.rfind(SUMMARY_TOKEN).ok_or(LogError::MissingSummary)?;
    let fragment = &text[at + SUMMARY_TOKEN.len()..];

    let (earned, possible) = scores::score_fraction(fragment).map_err(|_| {
        LogError::UnreadableScore(fragment.lines().next().unwrap_or_default().trim().to_string())
    })?;

    let mut results = BTreeMap::new();
    for line in text[..at].lines() {
        if line.starts_with(PASS_MARKER) {
            let cleaned = drop_points_trailer(line).replacen("pass", "", 1);
            results.insert(strip_marker(&cleaned), true);
        } else if line.starts_with(FAIL_MARKER) {
            results.insert(strip_marker(&drop_points_trailer(line)), false);
        }
    }

    Ok(ParsedLog {
        score: Score::new(earned, possible),
        results,
    })
}

/// Drops the marker and the character that follows it, then trims.
///
/// The extra character matches the grader's `✅ Title` layout; titles are
/// trimmed afterwards so a missing space is harmless.
fn strip_marker(line: &str) -> String {
    let mut chars = line.chars();
    chars.next();
    chars.next();
    chars.as_str().trim().to_string()
}

/// Removes the first ` points N/M` trailer from a detail line, if one is
/// present: a single whitespace on either side of `points`, then digits,
/// `/`, digits. Returns the line unchanged otherwise.
fn drop_points_trailer(line: &str) -> String {
    /// counts leading ASCII digits of `s`
    fn digits(s: &str) -> usize {
        s.bytes().take_while(u8::is_ascii_digit).count()
    }

    for (at, _) in line.match_indices("points") {
        let Some(before) = line[..at].chars().next_back() else {
            continue;
        };
        if !before.is_whitespace() {
            continue;
        }

        let rest = &line[at + "points".len()..];
        let Some(after) = rest.chars().next() else {
            continue;
        };
        if !after.is_whitespace() {
            continue;
        }

        let tail = &rest[after.len_utf8()..];
        let earned_len = digits(tail);
        if earned_len == 0 || !tail[earned_len..].starts_with('/') {
            continue;
        }
        let possible_len = digits(&tail[earned_len + 1..]);
        if possible_len == 0 {
            continue;
        }

        let start = at - before.len_utf8();
        let end = at + "points".len() + after.len_utf8() + earned_len + 1 + possible_len;
        let mut stripped = String::with_capacity(line.len());
        stripped.push_str(&line[..start]);
        stripped.push_str(&line[end..]);
        return stripped;
    }

    line.to_string()
}
