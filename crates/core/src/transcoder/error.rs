//! Error types for the transcoder module.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur during transcoding.
#[derive(Debug, Error)]
pub enum TranscodeError {
    /// The engine ran past its wall-clock limit and was killed.
    #[error("Transcode timed out after {timeout_secs} seconds")]
    Timeout { timeout_secs: u64 },

    /// The engine exited unsuccessfully.
    #[error("Transcode failed with exit code {}: {stderr_excerpt}", display_code(.exit_code))]
    Failed {
        exit_code: Option<i32>,
        stderr_excerpt: String,
    },

    /// The engine binary could not be found.
    #[error("Media engine not found at path: {path}")]
    EngineNotFound { path: PathBuf },

    /// The requested output format is not known.
    #[error("Unsupported output format: {format}")]
    UnsupportedFormat { format: String },

    /// The engine reported success but produced no usable output.
    #[error("Transcode produced no output at {path}")]
    OutputMissing { path: PathBuf },

    /// I/O error around the transcode.
    #[error("Transcode I/O error: {0}")]
    Io(#[from] std::io::Error),
}

fn display_code(code: &Option<i32>) -> String {
    match code {
        Some(code) => code.to_string(),
        None => "none (terminated by signal)".to_string(),
    }
}

impl TranscodeError {
    /// Creates a failure from an exit code and stderr excerpt.
    pub fn failed(exit_code: Option<i32>, stderr_excerpt: impl Into<String>) -> Self {
        Self::Failed {
            exit_code,
            stderr_excerpt: stderr_excerpt.into(),
        }
    }

    /// Stable machine-readable kind used in job failure reasons.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Timeout { .. } => "transcode_timeout",
            Self::Io(_) => "transcode_io_error",
            Self::Failed { .. }
            | Self::EngineNotFound { .. }
            | Self::UnsupportedFormat { .. }
            | Self::OutputMissing { .. } => "transcode_failed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failed_message_includes_code_and_stderr() {
        let err = TranscodeError::failed(Some(1), "Invalid data found when processing input");
        let msg = err.to_string();
        assert!(msg.contains("exit code 1"));
        assert!(msg.contains("Invalid data found"));
        assert_eq!(err.kind(), "transcode_failed");
    }

    #[test]
    fn test_signal_exit_message() {
        let err = TranscodeError::failed(None, "");
        assert!(err.to_string().contains("terminated by signal"));
    }

    #[test]
    fn test_kinds() {
        assert_eq!(
            TranscodeError::Timeout { timeout_secs: 1 }.kind(),
            "transcode_timeout"
        );
        assert_eq!(
            TranscodeError::Io(std::io::Error::other("disk")).kind(),
            "transcode_io_error"
        );
    }
}
