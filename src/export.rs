#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDateTime, Utc};
use csv::{ReaderBuilder, StringRecord, Trim};

/// Header of the column carrying the student's GitHub username.
const USERNAME_COLUMN: &str = "github_username";

/// Header of the column carrying the student repository URL.
const REPO_URL_COLUMN: &str = "student_repository_url";

/// Header of the column carrying the points the classroom awarded.
const POINTS_COLUMN: &str = "points_awarded";

/// Header of the column carrying the submission instant.
const TIMESTAMP_COLUMN: &str = "submission_timestamp";

/// One row of the classroom export, fresh each run. Folded into a
/// [`crate::store::StudentRecord`] by the reconciler and then discarded.
#[derive(Clone, Debug, PartialEq)]
pub struct SubmissionRecord {
    /// The student's GitHub username, unique within one export
    pub username:       String,
    /// URL of the student's assignment repository
    pub repo_url:       String,
    /// Points the classroom itself awarded, when present
    pub points_awarded: Option<f64>,
    /// Instant the student last submitted
    pub submitted_at:   DateTime<Utc>,
}

/// Parses the raw tabular text of the classroom export into submission
/// records, in input order.
///
/// The first row names the columns; all four required columns must be
/// present or the whole export is rejected. Individual rows are dropped
/// (with a warning) when they carry no username or an unreadable
/// timestamp; blank rows are skipped silently.
pub fn read_export(text: &str) -> Result<Vec<SubmissionRecord>> {
    let mut reader = ReaderBuilder::new()
        .trim(Trim::All)
        .flexible(true)
        .from_reader(text.as_bytes());

    let headers = reader
        .headers()
        .context("Could not read the export header row")?
        .clone();
    let column = |name: &str| {
        headers
            .iter()
            .position(|header| header == name)
            .with_context(|| format!("Export is missing the `{name}` column"))
    };

    let username_column = column(USERNAME_COLUMN)?;
    let repo_url_column = column(REPO_URL_COLUMN)?;
    let points_column = column(POINTS_COLUMN)?;
    let timestamp_column = column(TIMESTAMP_COLUMN)?;

    let mut submissions = Vec::new();
    for (index, row) in reader.records().enumerate() {
        let row: StringRecord = row.with_context(|| format!("Could not read export row {}", index + 2))?;
        if row.iter().all(str::is_empty) {
            continue;
        }

        let Some(username) = row.get(username_column).filter(|cell| !cell.is_empty()) else {
            tracing::warn!("dropping export row {}: no GitHub username", index + 2);
            continue;
        };

        let stamp = row.get(timestamp_column).unwrap_or_default();
        let Some(submitted_at) = parse_instant(stamp) else {
            tracing::warn!("dropping export row for {username}: unreadable submission timestamp `{stamp}`");
            continue;
        };

        submissions.push(SubmissionRecord {
            username: username.to_string(),
            repo_url: row.get(repo_url_column).unwrap_or_default().to_string(),
            points_awarded: row.get(points_column).and_then(|cell| cell.parse::<f64>().ok()),
            submitted_at,
        });
    }

    Ok(submissions)
}

/// Parses the export's submission timestamp: RFC 3339 first, then the
/// `YYYY-MM-DD HH:MM:SS UTC` form the classroom service actually emits.
fn parse_instant(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(instant) = DateTime::parse_from_rfc3339(value) {
        return Some(instant.with_timezone(&Utc));
    }

    NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S UTC")
        .ok()
        .map(|naive| naive.and_utc())
}
