//! Trait definitions for the transcoder module.

use async_trait::async_trait;

use super::error::TranscodeError;
use super::types::{ExitOutcome, TranscodeInvocation};

/// An external media-processing engine.
///
/// Implementations only run the process and report how it ended; mapping
/// that outcome to success or failure is left to [`Transcoder`](super::Transcoder).
#[async_trait]
pub trait MediaEngine: Send + Sync {
    /// Returns the name of this engine implementation.
    fn name(&self) -> &str;

    /// Checks that the engine binary is reachable and runs.
    async fn check_available(&self) -> Result<(), TranscodeError>;

    /// Runs one transcode, enforcing `invocation.timeout`.
    ///
    /// Dropping the returned future must terminate the running process.
    async fn transcode(
        &self,
        invocation: &TranscodeInvocation,
    ) -> Result<ExitOutcome, TranscodeError>;
}
