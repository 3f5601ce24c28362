#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

use std::{
    path::{Path, PathBuf},
    sync::{Arc, Mutex, OnceLock},
    time::Duration,
};

use anyhow::{Context, Result};
use reqwest::Client;

/// User agent sent with every HTTP request.
const USER_AGENT: &str = concat!("classtally/", env!("CARGO_PKG_VERSION"));

/// Runtime configuration shared across the crate, read once from the
/// environment. Values are validated for presence only.
pub struct ConfigState {
    /// Organization that owns the student repositories
    organization:  String,
    /// Classroom slug as it appears in the classroom URL
    classroom:     String,
    /// Assignment name, also the student repository name prefix
    assignment:    String,
    /// The gradable works within the assignment
    works:         Vec<String>,
    /// API token for repository and profile requests
    auth_token:    String,
    /// Session cookie value for the classroom export download
    session_token: String,
    /// Where the dashboard snapshot is read from and written to
    snapshot_path: PathBuf,
    /// Shared reqwest HTTP client reused across network helpers
    http_client:   Client,
}

impl ConfigState {
    /// Construct a new configuration instance by reading the environment.
    fn new() -> Result<Self> {
        let organization = require("CLASSTALLY_ORG")?;
        let classroom = require("CLASSTALLY_CLASSROOM")?;
        let assignment = require("CLASSTALLY_ASSIGNMENT")?;
        let auth_token = require("GITHUB_TOKEN")?;
        let session_token = require("CLASSROOM_SESSION")?;

        let works = std::env::var("CLASSTALLY_WORKS")
            .unwrap_or_else(|_| "main".to_string())
            .split(',')
            .map(|work| work.trim().to_string())
            .filter(|work| !work.is_empty())
            .collect();

        let snapshot_path = std::env::var("CLASSTALLY_SNAPSHOT")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("data.json"));

        let http_client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(read_timeout_secs("CLASSTALLY_HTTP_TIMEOUT_SECS", 30))
            .build()
            .context("Failed to construct shared HTTP client")?;

        Ok(Self {
            organization,
            classroom,
            assignment,
            works,
            auth_token,
            session_token,
            snapshot_path,
            http_client,
        })
    }

    /// Returns the organization that owns the student repositories.
    pub fn organization(&self) -> &str {
        &self.organization
    }

    /// Returns the classroom slug.
    pub fn classroom(&self) -> &str {
        &self.classroom
    }

    /// Returns the assignment name.
    pub fn assignment(&self) -> &str {
        &self.assignment
    }

    /// Returns the configured work identifiers.
    pub fn works(&self) -> &[String] {
        &self.works
    }

    /// Returns the API token.
    pub fn auth_token(&self) -> &str {
        &self.auth_token
    }

    /// Returns the classroom session cookie value.
    pub fn session_token(&self) -> &str {
        &self.session_token
    }

    /// Returns the snapshot path.
    pub fn snapshot_path(&self) -> &Path {
        &self.snapshot_path
    }

    /// Returns a clone of the shared reqwest HTTP client.
    pub fn http_client(&self) -> Client {
        self.http_client.clone()
    }
}

/// Shared configuration handle used throughout the crate.
#[derive(Clone)]
pub struct ConfigHandle(Arc<ConfigState>);

impl std::ops::Deref for ConfigHandle {
    type Target = ConfigState;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// Global storage for the lazily constructed configuration state.
static CONFIG_SLOT: OnceLock<Mutex<Option<Arc<ConfigState>>>> = OnceLock::new();

/// Returns the mutex guarding the global configuration slot.
fn slot() -> &'static Mutex<Option<Arc<ConfigState>>> {
    CONFIG_SLOT.get_or_init(|| Mutex::new(None))
}

/// Ensure the global configuration has been initialized and return a
/// handle.
pub fn ensure_initialized() -> Result<ConfigHandle> {
    let slot = slot();
    let mut guard = slot.lock().expect("config slot poisoned");
    if let Some(cfg) = guard.as_ref() {
        return Ok(ConfigHandle(Arc::clone(cfg)));
    }

    let cfg = ConfigState::new().map(Arc::new)?;
    *guard = Some(Arc::clone(&cfg));
    Ok(ConfigHandle(cfg))
}

/// Reads a required environment variable, rejecting empty values.
fn require(name: &str) -> Result<String> {
    std::env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .with_context(|| format!("{name} must be set"))
}

/// Parses an environment variable into a `Duration`, falling back to
/// `default_secs` when parsing fails or the variable is missing.
fn read_timeout_secs(env: &str, default_secs: u64) -> Duration {
    std::env::var(env)
        .ok()
        .and_then(|value| value.parse::<u64>().ok())
        .map(Duration::from_secs)
        .unwrap_or_else(|| Duration::from_secs(default_secs))
}
