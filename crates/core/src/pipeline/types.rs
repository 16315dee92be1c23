//! Types for the pipeline module.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

use crate::credentials::CredentialError;
use crate::fetcher::FetchError;
use crate::transcoder::{OutputFormat, TranscodeError};

/// Unique job identifier (UUID v4, hyphenated).
pub type JobId = String;

/// Lifecycle state of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Pending,
    Fetching,
    Transcoding,
    Done,
    Failed,
}

impl JobState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Fetching => "fetching",
            Self::Transcoding => "transcoding",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }

    /// Transitions only move forward; `failed` is reachable from any
    /// non-terminal state.
    pub fn can_transition_to(&self, next: JobState) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Fetching)
                | (Self::Fetching, Self::Transcoding)
                | (Self::Transcoding, Self::Done)
                | (Self::Pending | Self::Fetching | Self::Transcoding, Self::Failed)
        )
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a job failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureReason {
    /// Stable machine-readable kind, e.g. `fetch_timeout`.
    pub kind: String,
    pub message: String,
}

impl FailureReason {
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
        }
    }

    pub fn cancelled() -> Self {
        Self::new("cancelled", "Job was cancelled")
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new("internal", message)
    }
}

impl From<&FetchError> for FailureReason {
    fn from(e: &FetchError) -> Self {
        Self::new(e.kind(), e.to_string())
    }
}

impl From<&TranscodeError> for FailureReason {
    fn from(e: &TranscodeError) -> Self {
        Self::new(e.kind(), e.to_string())
    }
}

impl From<&CredentialError> for FailureReason {
    fn from(e: &CredentialError) -> Self {
        Self::new("credential_unavailable", e.to_string())
    }
}

/// A delivered job result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    /// Location under the data directory. Not exposed over the API.
    #[serde(skip)]
    pub path: PathBuf,
    pub size_bytes: u64,
    pub format: OutputFormat,
    /// Suggested download name, `<job_id>.<ext>`.
    pub file_name: String,
}

/// Point-in-time view of a job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobSnapshot {
    pub id: JobId,
    pub url: String,
    pub format: OutputFormat,
    pub state: JobState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureReason>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifact: Option<Artifact>,
    /// Version of the credential used for the fetch, once it started.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credential_version: Option<u64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Status of the slot pool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolStatus {
    /// Jobs holding a slot.
    pub active_jobs: usize,
    /// Admitted jobs waiting for a slot.
    pub queued_jobs: usize,
    pub max_concurrent: usize,
    pub queue_depth: usize,
    /// Jobs finished successfully since startup.
    pub total_processed: u64,
    /// Jobs failed (including cancelled) since startup.
    pub total_failed: u64,
    /// Submissions refused for saturation since startup.
    pub total_rejected: u64,
}

/// Number of known jobs per state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobCounts {
    pub pending: usize,
    pub fetching: usize,
    pub transcoding: usize,
    pub done: usize,
    pub failed: usize,
}

impl JobCounts {
    pub(crate) fn add(&mut self, state: JobState) {
        match state {
            JobState::Pending => self.pending += 1,
            JobState::Fetching => self.fetching += 1,
            JobState::Transcoding => self.transcoding += 1,
            JobState::Done => self.done += 1,
            JobState::Failed => self.failed += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.pending + self.fetching + self.transcoding + self.done + self.failed
    }
}

/// Overall pipeline status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineStatus {
    /// Whether the pipeline accepts jobs.
    pub running: bool,
    pub pool: PoolStatus,
    pub jobs: JobCounts,
}
