//! Error types for the credentials module.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while loading the session credential.
#[derive(Debug, Error)]
pub enum CredentialError {
    /// The cookie file is missing or unreadable.
    #[error("Credential unavailable at {path}: {reason}")]
    Unavailable { path: PathBuf, reason: String },

    /// The cookie file was read but holds no usable cookie.
    #[error("Credential file {path} contains no cookies")]
    Empty { path: PathBuf },

    /// No credential has been loaded yet.
    #[error("Credential has not been loaded")]
    NotLoaded,
}

impl CredentialError {
    pub(crate) fn unavailable(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::Unavailable {
            path: path.into(),
            reason: reason.into(),
        }
    }
}
