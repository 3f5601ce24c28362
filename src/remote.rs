#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

use std::fmt::Display;

use anyhow::{Context, Result, ensure};
use chrono::DateTime;
use reqwest::{StatusCode, header};
use serde::Deserialize;

use crate::config::ConfigHandle;

/// Base URL for the GitHub REST API.
const API_BASE: &str = "https://api.github.com";

/// Base URL for the classroom service the export is downloaded from.
const CLASSROOM_BASE: &str = "https://classroom.github.com";

/// Canonical identity for one student as resolved by the user-profile
/// capability.
#[derive(Deserialize, Clone, Debug)]
pub struct Profile {
    /// The canonical login (usernames differ in case at most)
    pub login:      String,
    /// Avatar image URL
    pub avatar_url: String,
}

/// A repository file as delivered by the content capability, before
/// transport decoding.
#[derive(Deserialize, Clone, Debug)]
pub struct ContentPayload {
    /// The file body in its transport encoding
    pub content:  String,
    /// The transport encoding, `base64` for regular files
    pub encoding: String,
}

/// Remaining API quota, read after a run purely for information.
#[derive(Deserialize, Clone, Copy, Debug)]
pub struct RateInfo {
    /// Total requests allowed per window
    pub limit:     u32,
    /// Requests left in the current window
    pub remaining: u32,
    /// Unix timestamp at which the window resets
    pub reset:     i64,
}

impl Display for RateInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{} requests remaining", self.remaining, self.limit)?;
        if let Some(reset) = DateTime::from_timestamp(self.reset, 0) {
            write!(f, " (resets at {})", reset.format("%H:%M:%S UTC"))?;
        }
        Ok(())
    }
}

/// Envelope the rate-limit endpoint wraps its payload in.
#[derive(Deserialize)]
struct RateEnvelope {
    /// The core REST quota
    rate: RateInfo,
}

/// The external capabilities the pipeline depends on. The production
/// implementation is [`GitHubRemote`]; tests drive the pipeline with an
/// in-memory stub.
#[allow(async_fn_in_trait)]
pub trait Remote {
    /// Downloads the classroom-wide submission export as raw tabular
    /// text. Any failure here is fatal for the whole run.
    async fn export(&self) -> Result<String>;

    /// Resolves a username to its canonical profile. `None` means the
    /// user does not exist, which is a per-student failure at the call
    /// site; transport errors surface as `Err`.
    async fn user_profile(&self, username: &str) -> Result<Option<Profile>>;

    /// Retrieves one file from a repository's published branch. `None`
    /// means the repository or file does not exist, an expected outcome
    /// for students who have not produced output yet.
    async fn repo_file(&self, repo: &str, path: &str) -> Result<Option<ContentPayload>>;

    /// Reads the remaining API quota.
    async fn rate_limit(&self) -> Result<RateInfo>;
}

/// The production [`Remote`] backed by the GitHub REST API and the
/// classroom grade-download endpoint.
pub struct GitHubRemote {
    /// Shared HTTP client (user agent and timeout already applied)
    client:       reqwest::Client,
    /// Organization that owns the student repositories
    organization: String,
    /// Classroom slug as it appears in the classroom URL
    classroom:    String,
    /// Assignment name, also the student repository name prefix
    assignment:   String,
    /// API token for repository and profile requests
    auth_token:   String,
    /// Session cookie value for the classroom export download
    session:      String,
}

impl GitHubRemote {
    /// Builds a remote from the process configuration.
    pub fn from_config(cfg: &ConfigHandle) -> Self {
        Self {
            client:       cfg.http_client(),
            organization: cfg.organization().to_string(),
            classroom:    cfg.classroom().to_string(),
            assignment:   cfg.assignment().to_string(),
            auth_token:   cfg.auth_token().to_string(),
            session:      cfg.session_token().to_string(),
        }
    }

    /// Starts an authenticated API request.
    fn api_get(&self, url: &str) -> reqwest::RequestBuilder {
        self.client
            .get(url)
            .bearer_auth(&self.auth_token)
            .header(header::ACCEPT, "application/vnd.github+json")
    }
}

impl Remote for GitHubRemote {
    async fn export(&self) -> Result<String> {
        let url = format!(
            "{CLASSROOM_BASE}/classrooms/{}/assignments/{}/download_grades",
            self.classroom, self.assignment
        );
        tracing::info!("fetching {url}");

        let response = self
            .client
            .get(&url)
            .header(header::ACCEPT, "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8")
            .header(header::COOKIE, format!("_github_classroom_session={}", self.session))
            .send()
            .await
            .with_context(|| format!("Could not reach {url}"))?;

        ensure!(
            response.status().is_success(),
            "Export download failed with {} for {url}",
            response.status()
        );

        response.text().await.context("Could not read the export body")
    }

    async fn user_profile(&self, username: &str) -> Result<Option<Profile>> {
        let url = format!("{API_BASE}/users/{username}");
        let response = self
            .api_get(&url)
            .send()
            .await
            .with_context(|| format!("Could not reach {url}"))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let profile = response
            .error_for_status()
            .with_context(|| format!("Profile lookup failed for {username}"))?
            .json()
            .await
            .with_context(|| format!("Profile for {username} was not valid JSON"))?;

        Ok(Some(profile))
    }

    async fn repo_file(&self, repo: &str, path: &str) -> Result<Option<ContentPayload>> {
        let url = format!(
            "{API_BASE}/repos/{}/{repo}/contents/{path}?ref=gh-pages",
            self.organization
        );
        let response = self
            .api_get(&url)
            .send()
            .await
            .with_context(|| format!("Could not reach {url}"))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let payload = response
            .error_for_status()
            .with_context(|| format!("Content request failed for {repo}/{path}"))?
            .json()
            .await
            .with_context(|| format!("Content payload for {repo}/{path} was not valid JSON"))?;

        Ok(Some(payload))
    }

    async fn rate_limit(&self) -> Result<RateInfo> {
        let envelope: RateEnvelope = self
            .api_get(&format!("{API_BASE}/rate_limit"))
            .send()
            .await
            .context("Could not reach the rate-limit endpoint")?
            .error_for_status()
            .context("Rate-limit request failed")?
            .json()
            .await
            .context("Rate-limit payload was not valid JSON")?;

        Ok(envelope.rate)
    }
}
