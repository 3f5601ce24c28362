#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

use std::fmt::Display;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use colored::Colorize;
use tabled::{Table, Tabled, settings::Style};

use crate::{
    aggregate::{Accumulator, Aggregation, Aggregator},
    config::ConfigHandle,
    export::{SubmissionRecord, read_export},
    fetch::{FetchError, LogFetcher, MANIFEST_FILE},
    logs::parse_log,
    remote::{Profile, Remote},
    store::{ReportStore, StudentRecord},
};

/// Why one student could not be processed this run. The batch always
/// continues past these; the student keeps whatever the previous
/// snapshot recorded.
#[derive(thiserror::Error, Debug)]
pub enum StudentError {
    /// The user-profile capability knows no such user
    #[error("no GitHub profile for `{0}`")]
    UnknownUser(String),
    /// The manifest exists but is not a JSON object of log filenames
    #[error("manifest could not be read")]
    BadManifest(#[source] serde_json::Error),
    /// Transport, auth, or decoding failure talking to a service
    #[error(transparent)]
    Transport(anyhow::Error),
}

/// Why a student was skipped without any external calls.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SkipReason {
    /// The stored record is at least as new as the export row
    UpToDate,
}

impl Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::UpToDate => write!(f, "up to date"),
        }
    }
}

/// How one submission was resolved against the persisted report.
#[derive(Debug)]
pub enum Outcome {
    /// First sighting of this student, full record inserted
    Inserted,
    /// Stored record refreshed with newer data
    Updated,
    /// Stored data is current, nothing was fetched
    Skipped(SkipReason),
    /// The student could not be processed this run
    Failed(StudentError),
}

impl Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Outcome::Inserted => write!(f, "inserted"),
            Outcome::Updated => write!(f, "updated"),
            Outcome::Skipped(_) => write!(f, "skipped"),
            Outcome::Failed(_) => write!(f, "failed"),
        }
    }
}

/// Outcome counts for the one-line run summary.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct RunTotals {
    /// Students inserted for the first time
    pub inserted: usize,
    /// Students whose stored record was refreshed
    pub updated:  usize,
    /// Students skipped as current
    pub skipped:  usize,
    /// Students that failed and kept their previous data
    pub failed:   usize,
}

impl RunTotals {
    /// Tallies one outcome.
    fn count(&mut self, outcome: &Outcome) {
        match outcome {
            Outcome::Inserted => self.inserted += 1,
            Outcome::Updated => self.updated += 1,
            Outcome::Skipped(_) => self.skipped += 1,
            Outcome::Failed(_) => self.failed += 1,
        }
    }
}

/// Everything one student's fetch pass produced.
struct Harvest {
    /// Canonical identity from the profile lookup
    profile:      Profile,
    /// Repository URL from the export row
    repo_url:     String,
    /// Submission instant from the export row
    submitted_at: DateTime<Utc>,
    /// Grades and details folded from the parsed logs
    tally:        Aggregation,
}

/// One row of the end-of-run outcome table.
#[derive(Tabled)]
struct OutcomeRow {
    /// Export username
    #[tabled(rename = "Student")]
    student: String,
    /// Outcome word
    #[tabled(rename = "Outcome")]
    outcome: String,
    /// Scores, skip reason, or failure detail
    #[tabled(rename = "Notes")]
    notes:   String,
}

/// Reconciles every submission in the classroom export against the
/// store: current students are skipped with zero external calls, new
/// and stale students are fetched, parsed, and merged. Per-student
/// failures are logged and counted, never fatal. The run-wide
/// accumulations merge into the store once at the end.
pub async fn reconcile<R: Remote>(
    remote: &R,
    works: &[String],
    assignment: &str,
    store: &mut ReportStore,
) -> Result<RunTotals> {
    let export = remote
        .export()
        .await
        .context("Could not download the classroom export")?;
    let submissions = read_export(&export)?;
    tracing::info!("export contains {} submissions", submissions.len());

    let mut accumulator = Accumulator::default();
    let mut totals = RunTotals::default();
    let mut rows = Vec::with_capacity(submissions.len());

    for submission in &submissions {
        let (outcome, notes) = if store.is_current(&submission.username, submission.submitted_at) {
            let reason = SkipReason::UpToDate;
            (Outcome::Skipped(reason), reason.to_string())
        } else {
            match harvest(remote, works, assignment, submission).await {
                Ok((harvested, contribution)) => {
                    let notes = describe_grades(&harvested.tally);
                    accumulator.absorb(contribution);
                    (apply(store, harvested), notes)
                }
                Err(error) => {
                    tracing::warn!("{}: {error}", submission.username);
                    let notes = error.to_string();
                    (Outcome::Failed(error), notes)
                }
            }
        };

        totals.count(&outcome);
        rows.push(OutcomeRow {
            student: submission.username.clone(),
            outcome: outcome.to_string(),
            notes,
        });
    }

    accumulator.merge_into(store);
    store.latest_updated_at = Utc::now();

    eprintln!("{}", Table::new(&rows).with(Style::modern()));
    eprintln!(
        "{} inserted, {} updated, {} skipped, {} failed",
        totals.inserted.to_string().green(),
        totals.updated.to_string().cyan(),
        totals.skipped.to_string().yellow(),
        totals.failed.to_string().red(),
    );

    Ok(totals)
}

/// Runs the whole pipeline against the configured classroom: load the
/// previous snapshot, reconcile every submission, write the new
/// snapshot atomically, then report the remaining API quota. A fatal
/// error anywhere leaves the previous snapshot untouched.
pub async fn collect<R: Remote>(remote: &R, cfg: &ConfigHandle) -> Result<RunTotals> {
    let mut store = ReportStore::load(cfg.snapshot_path())?;
    let totals = reconcile(remote, cfg.works(), cfg.assignment(), &mut store).await?;
    store.save(cfg.snapshot_path())?;

    match remote.rate_limit().await {
        Ok(rate) => tracing::info!("API quota: {rate}"),
        Err(error) => tracing::warn!("could not read the API quota: {error:#}"),
    }

    Ok(totals)
}

/// Fetch pass for one student: identity lookup, then the manifest, then
/// each configured work's log, in that order. A missing manifest records
/// the student with no scores; per-work fetch or parse failures degrade
/// to "no grade for that work" rather than failing the student.
async fn harvest<R: Remote>(
    remote: &R,
    works: &[String],
    assignment: &str,
    submission: &SubmissionRecord,
) -> Result<(Harvest, Accumulator), StudentError> {
    let username = submission.username.as_str();

    let profile = remote
        .user_profile(username)
        .await
        .map_err(StudentError::Transport)?
        .ok_or_else(|| StudentError::UnknownUser(username.to_string()))?;

    let fetcher = LogFetcher::new(remote, assignment);
    let mut aggregator = Aggregator::new(works);

    match fetcher.manifest(username).await {
        Ok(Some(manifest)) => {
            for work in works {
                let Some(filename) = manifest.log_file(work) else {
                    continue;
                };

                let text = match fetcher.file_text(username, filename).await {
                    Ok(Some(text)) => text,
                    Ok(None) => {
                        tracing::warn!("{username}: log `{filename}` for {work} is missing");
                        continue;
                    }
                    Err(error) => {
                        tracing::warn!("{username}: could not fetch the log for {work}: {error:#}");
                        continue;
                    }
                };

                match parse_log(&text) {
                    Ok(parsed) => {
                        tracing::info!("{username:<15} {work} {}", parsed.score);
                        aggregator.fold(work, parsed);
                    }
                    Err(error) => {
                        tracing::warn!("{username}: log for {work} did not parse: {error}");
                    }
                }
            }
        }
        Ok(None) => {
            tracing::warn!("{username:<15} has no {MANIFEST_FILE}, recording no scores");
        }
        Err(FetchError::ManifestUnreadable(source)) => {
            return Err(StudentError::BadManifest(source));
        }
        Err(FetchError::Transport(error)) => return Err(StudentError::Transport(error)),
    }

    let (tally, contribution) = aggregator.into_parts();
    Ok((
        Harvest {
            profile,
            repo_url: submission.repo_url.clone(),
            submitted_at: submission.submitted_at,
            tally,
        },
        contribution,
    ))
}

/// Folds a harvested student into the store. The merge is per work: new
/// grades and details overwrite matching work keys, works the harvest
/// could not produce keep their previously stored values.
fn apply(store: &mut ReportStore, harvested: Harvest) -> Outcome {
    let Harvest {
        profile,
        repo_url,
        submitted_at,
        tally,
    } = harvested;

    match store.student_mut(&profile.login) {
        Some(record) => {
            record.name = profile.login;
            record.avatar_url = profile.avatar_url;
            record.repo_url = repo_url;
            record.grades.extend(tally.grades);
            record.details.extend(tally.details);
            record.last_update_at = Some(submitted_at);
            Outcome::Updated
        }
        None => {
            store.students.push(StudentRecord {
                name: profile.login,
                avatar_url: profile.avatar_url,
                repo_url,
                grades: tally.grades,
                details: tally.details,
                last_update_at: Some(submitted_at),
            });
            Outcome::Inserted
        }
    }
}

/// Renders a short `work: earned` listing for the outcome table.
fn describe_grades(tally: &Aggregation) -> String {
    if tally.grades.is_empty() {
        return "no scores".to_string();
    }

    tally
        .grades
        .iter()
        .map(|(work, earned)| format!("{work}: {earned}"))
        .collect::<Vec<_>>()
        .join(", ")
}
