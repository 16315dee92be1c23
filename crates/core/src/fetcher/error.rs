//! Error types for the fetcher module.

use thiserror::Error;

/// Errors that can occur while fetching a source.
#[derive(Debug, Error)]
pub enum FetchError {
    /// No progress within the idle interval.
    #[error("Fetch timed out after {idle_secs} seconds without progress")]
    Timeout { idle_secs: u64 },

    /// The remote host answered with a non-success status.
    #[error("Fetch failed with HTTP status {status}")]
    Http { status: u16 },

    /// Writing the download to disk failed.
    #[error("Fetch I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The resource exceeds the download cap.
    #[error("Source exceeds the download limit of {limit_bytes} bytes")]
    TooLarge { limit_bytes: u64 },

    /// The source URL could not be parsed or uses an unsupported scheme.
    #[error("Invalid source URL: {0}")]
    InvalidUrl(String),

    /// The source URL points at a local or private address.
    #[error("Source host is not allowed: {0}")]
    BlockedHost(String),

    /// The connection could not be established or broke mid-transfer.
    #[error("Connection failed: {0}")]
    Connection(String),

    /// The HTTP client could not be constructed.
    #[error("HTTP client setup failed: {0}")]
    Setup(String),
}

impl FetchError {
    /// Whether this error is worth retrying.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout { .. } | Self::Connection(_) => true,
            Self::Http { status } => *status == 429 || *status >= 500,
            _ => false,
        }
    }

    /// Stable machine-readable kind used in job failure reasons.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Timeout { .. } => "fetch_timeout",
            Self::Http { .. } => "fetch_http_error",
            Self::Io(_) => "fetch_io_error",
            Self::TooLarge { .. } => "fetch_too_large",
            Self::InvalidUrl(_) | Self::BlockedHost(_) => "fetch_invalid_url",
            Self::Connection(_) | Self::Setup(_) => "fetch_connection",
        }
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_builder() {
            Self::InvalidUrl(e.to_string())
        } else {
            Self::Connection(e.to_string())
        }
    }
}
