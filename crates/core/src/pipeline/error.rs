//! Error types for the pipeline module.

use thiserror::Error;

use super::types::JobState;

/// Errors returned by pipeline operations.
///
/// Per-job failures are not errors here: they end the job in
/// [`JobState::Failed`] with a [`FailureReason`](super::FailureReason).
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Concurrency limit and queue are both full.
    #[error("Pipeline saturated: {capacity} jobs already running or queued")]
    Saturated { capacity: usize },

    /// The job exists but has no deliverable result.
    #[error("Job {job_id} is not ready (state: {state})")]
    NotReady { job_id: String, state: JobState },

    /// Unknown job id.
    #[error("Job not found: {0}")]
    NotFound(String),

    /// The submission is malformed.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The pipeline is not accepting jobs.
    #[error("Pipeline is not running")]
    NotRunning,

    /// Working directories could not be prepared.
    #[error("Storage error: {0}")]
    Storage(#[from] std::io::Error),
}

impl PipelineError {
    /// Label used for rejection metrics.
    pub fn rejection_reason(&self) -> &'static str {
        match self {
            Self::Saturated { .. } => "saturated",
            Self::InvalidRequest(_) => "invalid",
            Self::NotRunning => "not_running",
            _ => "other",
        }
    }
}
