use std::{
    collections::{BTreeMap, HashMap},
    sync::atomic::{AtomicUsize, Ordering},
};

use anyhow::Result;
use base64::{Engine, engine::general_purpose::STANDARD};
use chrono::{DateTime, TimeZone, Utc};
use classtally::{
    reconcile::reconcile,
    remote::{ContentPayload, Profile, RateInfo, Remote},
    store::{ReportStore, StudentRecord},
};

/// the export header every scenario shares
const HEADER: &str = "github_username,student_repository_url,points_awarded,submission_timestamp";

/// assignment name; student repositories are `lab-{username}`
const ASSIGNMENT: &str = "lab";

/// In-memory [`Remote`] with canned responses and a counter for every
/// per-student call (profile lookups and repository fetches).
struct StubRemote {
    export:   String,
    profiles: HashMap<String, Profile>,
    files:    HashMap<(String, String), ContentPayload>,
    fetches:  AtomicUsize,
}

impl StubRemote {
    fn new(rows: &[&str]) -> Self {
        let mut export = String::from(HEADER);
        for row in rows {
            export.push('\n');
            export.push_str(row);
        }

        Self {
            export,
            profiles: HashMap::new(),
            files: HashMap::new(),
            fetches: AtomicUsize::new(0),
        }
    }

    fn with_profile(mut self, username: &str) -> Self {
        self.profiles.insert(
            username.to_string(),
            Profile {
                login:      username.to_string(),
                avatar_url: format!("https://avatars/{username}"),
            },
        );
        self
    }

    fn with_file(mut self, repo: &str, path: &str, text: &str) -> Self {
        self.files.insert(
            (repo.to_string(), path.to_string()),
            ContentPayload {
                content:  STANDARD.encode(text),
                encoding: "base64".to_string(),
            },
        );
        self
    }

    fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::Relaxed)
    }
}

impl Remote for StubRemote {
    async fn export(&self) -> Result<String> {
        Ok(self.export.clone())
    }

    async fn user_profile(&self, username: &str) -> Result<Option<Profile>> {
        self.fetches.fetch_add(1, Ordering::Relaxed);
        Ok(self.profiles.get(username).cloned())
    }

    async fn repo_file(&self, repo: &str, path: &str) -> Result<Option<ContentPayload>> {
        self.fetches.fetch_add(1, Ordering::Relaxed);
        Ok(self.files.get(&(repo.to_string(), path.to_string())).cloned())
    }

    async fn rate_limit(&self) -> Result<RateInfo> {
        Ok(RateInfo {
            limit:     5000,
            remaining: 5000,
            reset:     0,
        })
    }
}

fn works(names: &[&str]) -> Vec<String> {
    names.iter().map(|name| name.to_string()).collect()
}

fn midnight() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
}

fn stored(name: &str, grades: &[(&str, f64)], at: DateTime<Utc>) -> StudentRecord {
    StudentRecord {
        name: name.to_string(),
        avatar_url: format!("https://avatars/{name}"),
        repo_url: format!("https://repo/{name}"),
        grades: grades
            .iter()
            .map(|(work, earned)| (work.to_string(), *earned))
            .collect(),
        details: BTreeMap::new(),
        last_update_at: Some(at),
    }
}

#[tokio::test]
async fn inserts_a_new_student_from_parsed_logs() {
    let remote = StubRemote::new(&["alice,https://repo/alice,10,2024-01-01T00:00:00Z"])
        .with_profile("alice")
        .with_file("lab-alice", "latest.json", r#"{"main": "log.txt"}"#)
        .with_file("lab-alice", "log.txt", "✅ Q1\nPoints: 10/10");

    let mut store = ReportStore::empty();
    let totals = reconcile(&remote, &works(&["main"]), ASSIGNMENT, &mut store)
        .await
        .expect("run should succeed");

    assert_eq!(totals.inserted, 1);
    assert_eq!(store.students.len(), 1);

    let alice = &store.students[0];
    assert_eq!(alice.name, "alice");
    assert_eq!(alice.grades.get("main"), Some(&10.0));
    assert_eq!(alice.details["main"].get("Q1"), Some(&true));
    assert_eq!(alice.last_update_at, Some(midnight()));
    assert_eq!(store.available.get("main"), Some(&10.0));
    assert!(store.questions.contains("Q1"));
}

#[tokio::test]
async fn failed_lookup_skips_only_that_student() {
    let remote = StubRemote::new(&[
        "bob,https://repo/bob,1,2024-01-01T00:00:00Z",
        "alice,https://repo/alice,10,2024-01-01T00:00:00Z",
    ])
    .with_profile("alice")
    .with_file("lab-alice", "latest.json", r#"{"main": "log.txt"}"#)
    .with_file("lab-alice", "log.txt", "✅ Q1\nPoints: 10/10");

    let mut store = ReportStore::empty();
    let totals = reconcile(&remote, &works(&["main"]), ASSIGNMENT, &mut store)
        .await
        .expect("run should succeed despite the lookup failure");

    assert_eq!(totals.failed, 1);
    assert_eq!(totals.inserted, 1);
    assert!(store.student("bob").is_none());
    assert!(store.student("alice").is_some());
}

#[tokio::test]
async fn current_student_triggers_no_external_calls() {
    let remote = StubRemote::new(&["alice,https://repo/alice,10,2024-01-01T00:00:00Z"]);

    let mut store = ReportStore::empty();
    store.students.push(stored("alice", &[("main", 7.0)], midnight()));

    let totals = reconcile(&remote, &works(&["main"]), ASSIGNMENT, &mut store)
        .await
        .expect("run should succeed");

    assert_eq!(totals.skipped, 1);
    assert_eq!(remote.fetch_count(), 0, "a current student costs no API calls");
    assert_eq!(store.students[0].grades.get("main"), Some(&7.0));
    assert_eq!(store.students[0].last_update_at, Some(midnight()));
}

#[tokio::test]
async fn stale_student_is_refetched_and_merged_per_work() {
    let remote = StubRemote::new(&["alice,https://repo/alice,10,2024-01-01T00:00:00Z"])
        .with_profile("alice")
        .with_file("lab-alice", "latest.json", r#"{"main": "log.txt"}"#)
        .with_file("lab-alice", "log.txt", "✅ Q1\nPoints: 10/10");

    let mut store = ReportStore::empty();
    let stale_at = midnight() - chrono::Duration::days(1);
    store.students.push(stored("alice", &[("extra", 3.0)], stale_at));

    let totals = reconcile(&remote, &works(&["main", "extra"]), ASSIGNMENT, &mut store)
        .await
        .expect("run should succeed");

    assert_eq!(totals.updated, 1);

    let alice = &store.students[0];
    assert_eq!(alice.grades.get("main"), Some(&10.0));
    assert_eq!(alice.grades.get("extra"), Some(&3.0), "unfetched work keeps its stored grade");
    assert_eq!(alice.last_update_at, Some(midnight()));
}

#[tokio::test]
async fn missing_manifest_records_a_student_with_no_scores() {
    let remote = StubRemote::new(&["alice,https://repo/alice,10,2024-01-01T00:00:00Z"])
        .with_profile("alice");

    let mut store = ReportStore::empty();
    let totals = reconcile(&remote, &works(&["main"]), ASSIGNMENT, &mut store)
        .await
        .expect("run should succeed");

    assert_eq!(totals.inserted, 1);
    let alice = store.student("alice").expect("alice should be recorded");
    assert!(alice.grades.is_empty());
    assert!(alice.details.is_empty());
}

#[tokio::test]
async fn unreadable_manifest_fails_the_student() {
    let remote = StubRemote::new(&["alice,https://repo/alice,10,2024-01-01T00:00:00Z"])
        .with_profile("alice")
        .with_file("lab-alice", "latest.json", "not json at all");

    let mut store = ReportStore::empty();
    let totals = reconcile(&remote, &works(&["main"]), ASSIGNMENT, &mut store)
        .await
        .expect("run should succeed");

    assert_eq!(totals.failed, 1);
    assert!(store.students.is_empty());
}

#[tokio::test]
async fn available_ceiling_never_drops_across_runs() {
    let remote = StubRemote::new(&["alice,https://repo/alice,10,2024-01-01T00:00:00Z"])
        .with_profile("alice")
        .with_file("lab-alice", "latest.json", r#"{"main": "log.txt"}"#)
        .with_file("lab-alice", "log.txt", "✅ Q2\nPoints: 10/12");

    let mut store = ReportStore::empty();
    store.available.insert("main".to_string(), 20.0);
    store.questions.insert("Q1".to_string());

    reconcile(&remote, &works(&["main"]), ASSIGNMENT, &mut store)
        .await
        .expect("run should succeed");

    assert_eq!(store.available.get("main"), Some(&20.0));
    assert!(store.questions.contains("Q1"), "questions only ever grow");
    assert!(store.questions.contains("Q2"));
}

#[tokio::test]
async fn manifest_works_outside_the_configured_list_are_ignored() {
    let remote = StubRemote::new(&["alice,https://repo/alice,10,2024-01-01T00:00:00Z"])
        .with_profile("alice")
        .with_file(
            "lab-alice",
            "latest.json",
            r#"{"main": "log.txt", "bonus": "bonus.txt"}"#,
        )
        .with_file("lab-alice", "log.txt", "✅ Q1\nPoints: 10/10")
        .with_file("lab-alice", "bonus.txt", "✅ B1\nPoints: 99/99");

    let mut store = ReportStore::empty();
    reconcile(&remote, &works(&["main"]), ASSIGNMENT, &mut store)
        .await
        .expect("run should succeed");

    let alice = store.student("alice").expect("alice should be recorded");
    assert_eq!(alice.grades.keys().map(String::as_str).collect::<Vec<_>>(), vec!["main"]);
    assert!(!store.available.contains_key("bonus"));
}

#[tokio::test]
async fn unparseable_log_means_no_grade_for_that_work_only() {
    let remote = StubRemote::new(&["alice,https://repo/alice,10,2024-01-01T00:00:00Z"])
        .with_profile("alice")
        .with_file(
            "lab-alice",
            "latest.json",
            r#"{"main": "log.txt", "extra": "extra.txt"}"#,
        )
        .with_file("lab-alice", "log.txt", "no summary line here")
        .with_file("lab-alice", "extra.txt", "✅ E1\nPoints: 4/8");

    let mut store = ReportStore::empty();
    let totals = reconcile(&remote, &works(&["main", "extra"]), ASSIGNMENT, &mut store)
        .await
        .expect("run should succeed");

    assert_eq!(totals.inserted, 1);
    let alice = store.student("alice").expect("alice should be recorded");
    assert!(alice.grades.get("main").is_none());
    assert_eq!(alice.grades.get("extra"), Some(&4.0));
}
