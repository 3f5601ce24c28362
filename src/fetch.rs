#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

use anyhow::{Context, Result, bail};
use base64::{Engine, engine::general_purpose::STANDARD};

use crate::remote::{ContentPayload, Remote};

/// Name of the per-student manifest mapping work name → log filename,
/// published on the repository's static branch.
pub const MANIFEST_FILE: &str = "latest.json";

/// Ways the manifest retrieval can fail for one student. A *missing*
/// manifest is not among them: that is the expected "no scores yet"
/// outcome and comes back as `None`.
#[derive(thiserror::Error, Debug)]
pub enum FetchError {
    /// The manifest exists but is not a JSON object of log filenames
    #[error("manifest is not a JSON object of log filenames")]
    ManifestUnreadable(#[source] serde_json::Error),
    /// Transport, auth, or decoding failure talking to the service
    #[error(transparent)]
    Transport(#[from] anyhow::Error),
}

/// The work-name → log-filename mapping from a student's manifest.
/// Values that are not strings are ignored defensively.
#[derive(Clone, Debug)]
pub struct Manifest(serde_json::Map<String, serde_json::Value>);

impl Manifest {
    /// Returns the log filename recorded for `work`, if any.
    pub fn log_file(&self, work: &str) -> Option<&str> {
        self.0.get(work).and_then(serde_json::Value::as_str)
    }
}

/// Retrieves files from one student's repository on its published branch
/// and decodes their transport encoding into text.
pub struct LogFetcher<'r, R: Remote> {
    /// The repository content capability
    remote:     &'r R,
    /// Assignment name; student repositories are `{assignment}-{username}`
    assignment: &'r str,
}

impl<'r, R: Remote> LogFetcher<'r, R> {
    /// Creates a fetcher for the given assignment.
    pub fn new(remote: &'r R, assignment: &'r str) -> Self {
        Self { remote, assignment }
    }

    /// The classroom names each student repository after the assignment.
    fn repo_name(&self, username: &str) -> String {
        format!("{}-{username}", self.assignment)
    }

    /// Retrieves and decodes one file from the student's repository.
    /// `None` when the repository or the file does not exist.
    pub async fn file_text(&self, username: &str, path: &str) -> Result<Option<String>> {
        match self.remote.repo_file(&self.repo_name(username), path).await? {
            Some(payload) => decode_payload(&payload).map(Some),
            None => Ok(None),
        }
    }

    /// Retrieves the student's manifest. `None` means the student has no
    /// manifest and should be recorded with no grade for any work.
    pub async fn manifest(&self, username: &str) -> Result<Option<Manifest>, FetchError> {
        let Some(text) = self.file_text(username, MANIFEST_FILE).await? else {
            return Ok(None);
        };

        let entries = serde_json::from_str(&text).map_err(FetchError::ManifestUnreadable)?;
        Ok(Some(Manifest(entries)))
    }
}

/// Decodes a content payload into UTF-8 text. Base64 bodies arrive with
/// embedded newlines, which the decoder does not accept.
fn decode_payload(payload: &ContentPayload) -> Result<String> {
    match payload.encoding.as_str() {
        "base64" => {
            let compact: String = payload
                .content
                .chars()
                .filter(|c| !c.is_whitespace())
                .collect();
            let bytes = STANDARD
                .decode(compact)
                .context("Content payload is not valid base64")?;
            String::from_utf8(bytes).context("Decoded content is not UTF-8")
        }
        "utf-8" => Ok(payload.content.clone()),
        other => bail!("Unsupported content encoding `{other}`"),
    }
}
