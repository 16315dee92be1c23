//! Trait definitions for the fetcher module.

use async_trait::async_trait;
use reqwest::Url;
use std::path::Path;

use crate::artifact::TempArtifact;
use crate::credentials::Credential;

use super::error::FetchError;
use super::url_guard::validate_source_url;

/// Downloads a remote resource to local storage.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Returns the name of this fetcher implementation.
    fn name(&self) -> &str;

    /// Checks a submitted URL before any job is created.
    ///
    /// The default accepts any absolute http(s) URL.
    fn validate_url(&self, raw: &str) -> Result<Url, FetchError> {
        validate_source_url(raw, false)
    }

    /// Streams `url` into `destination`, attaching the credential's cookies.
    ///
    /// On error nothing is left at `destination` or any intermediate path.
    async fn fetch(
        &self,
        url: &Url,
        credential: &Credential,
        destination: &Path,
    ) -> Result<TempArtifact, FetchError>;
}
