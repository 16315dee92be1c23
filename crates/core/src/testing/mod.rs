//! Testing utilities and mock implementations.
//!
//! This module provides mock implementations of the fetch and media-engine
//! seams, allowing the job pipeline and HTTP surface to be exercised without
//! network access or an ffmpeg binary.
//!
//! # Example
//!
//! ```rust,ignore
//! use grabber_core::testing::{MockEngine, MockFetcher, MockOutcome};
//!
//! let fetcher = MockFetcher::new();
//! let engine = MockEngine::new();
//!
//! // Configure behavior
//! fetcher.set_payload(b"media".to_vec()).await;
//! engine.set_outcome(MockOutcome::Fail { code: 1, stderr: "bad input".into() }).await;
//!
//! // Use in JobPipeline / AppState...
//! ```

mod mock_engine;
mod mock_fetcher;

pub use mock_engine::{MockEngine, MockOutcome};
pub use mock_fetcher::{MockFetcher, RecordedFetch};

/// Test fixtures and helper functions.
pub mod fixtures {
    use chrono::Utc;
    use std::path::PathBuf;

    use crate::credentials::{Cookie, Credential};

    /// A minimal valid Netscape cookie file.
    pub const COOKIE_FILE: &str = "# Netscape HTTP Cookie File\n\
.example.com\tTRUE\t/\tFALSE\t0\tSID\tsecret\n";

    /// Writes [`COOKIE_FILE`] into `dir` and returns its path.
    pub fn write_cookie_file(dir: &std::path::Path) -> std::io::Result<PathBuf> {
        let path = dir.join("cookies.txt");
        std::fs::write(&path, COOKIE_FILE)?;
        Ok(path)
    }

    /// A loaded credential with a single session cookie for `domain`.
    pub fn credential(domain: &str) -> Credential {
        Credential {
            version: 1,
            loaded_at: Utc::now(),
            source: PathBuf::from("cookies.txt"),
            cookies: vec![Cookie {
                domain: domain.to_string(),
                include_subdomains: domain.starts_with('.'),
                path: "/".to_string(),
                secure: false,
                http_only: false,
                expires: None,
                name: "SID".to_string(),
                value: "secret".to_string(),
            }],
        }
    }
}
