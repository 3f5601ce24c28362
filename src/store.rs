#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

use std::{
    collections::{BTreeMap, BTreeSet},
    fs,
    path::Path,
};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The persisted per-student aggregate. Field names and the
/// epoch-millisecond timestamps are the dashboard's wire contract and
/// must not change across runs.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct StudentRecord {
    /// Canonical GitHub login, the record's unique key
    pub name: String,

    /// Avatar image URL from the user profile
    #[serde(rename = "avatar")]
    pub avatar_url: String,

    /// URL of the student's assignment repository
    #[serde(rename = "repo_url")]
    pub repo_url: String,

    /// Work name → points earned, keys limited to the configured works
    pub grades: BTreeMap<String, f64>,

    /// Work name → question title → pass/fail
    pub details: BTreeMap<String, BTreeMap<String, bool>>,

    /// Instant of the most recent submission folded in
    #[serde(rename = "lastUpdateAt", with = "chrono::serde::ts_milliseconds_option")]
    pub last_update_at: Option<DateTime<Utc>>,
}

/// The snapshot the ranking dashboard consumes: loaded once at start,
/// mutated in memory for the whole run, written once at the end.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ReportStore {
    /// Work name → maximum points ever observed for that work; never
    /// decreases across runs
    pub available: BTreeMap<String, f64>,

    /// Per-student records in insertion order (rank is derived by the
    /// dashboard, never stored)
    pub students: Vec<StudentRecord>,

    /// Every question title ever observed across all logs
    pub questions: BTreeSet<String>,

    /// Instant the snapshot was last written
    #[serde(rename = "latestUpdatedAt", with = "chrono::serde::ts_milliseconds")]
    pub latest_updated_at: DateTime<Utc>,
}

impl ReportStore {
    /// An empty store for the very first run.
    pub fn empty() -> Self {
        Self {
            available: BTreeMap::new(),
            students: Vec::new(),
            questions: BTreeSet::new(),
            latest_updated_at: Utc::now(),
        }
    }

    /// Loads the previous run's snapshot; a missing file is a first run,
    /// not an error.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::empty());
        }

        let text = fs::read_to_string(path)
            .with_context(|| format!("Could not read snapshot {}", path.display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("Snapshot {} is not a valid report", path.display()))
    }

    /// Writes the snapshot atomically: serialize to a sibling temporary
    /// file, then rename over the target so readers only ever see a
    /// complete document.
    pub fn save(&self, path: &Path) -> Result<()> {
        let payload = serde_json::to_string(self).context("Could not serialize the report")?;

        let staging = path.with_extension("tmp");
        fs::write(&staging, payload)
            .with_context(|| format!("Could not write {}", staging.display()))?;
        fs::rename(&staging, path)
            .with_context(|| format!("Could not move snapshot into {}", path.display()))?;

        Ok(())
    }

    /// Looks up a student by login. GitHub logins are case-insensitive,
    /// and export usernames may differ from the canonical login in case
    /// only.
    pub fn student(&self, login: &str) -> Option<&StudentRecord> {
        self.students
            .iter()
            .find(|student| student.name.eq_ignore_ascii_case(login))
    }

    /// Mutable variant of [`ReportStore::student`].
    pub fn student_mut(&mut self, login: &str) -> Option<&mut StudentRecord> {
        self.students
            .iter_mut()
            .find(|student| student.name.eq_ignore_ascii_case(login))
    }

    /// Whether the stored record for `login` is at least as new as the
    /// incoming submission instant. A current student is skipped without
    /// any external calls; a skipped student keeps every previously
    /// persisted grade.
    pub fn is_current(&self, login: &str, submitted_at: DateTime<Utc>) -> bool {
        self.student(login)
            .and_then(|student| student.last_update_at)
            .is_some_and(|at| at >= submitted_at)
    }
}
