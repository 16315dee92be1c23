//! Mock fetcher for testing.

use async_trait::async_trait;
use reqwest::Url;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::artifact::TempArtifact;
use crate::credentials::Credential;
use crate::fetcher::{FetchError, Fetcher};

/// A recorded fetch for test assertions.
#[derive(Debug, Clone)]
pub struct RecordedFetch {
    pub url: Url,
    /// Version of the credential the fetch used.
    pub credential_version: u64,
    /// Whether a `Cookie` header would have been sent.
    pub sent_cookies: bool,
}

/// Mock implementation of the Fetcher trait.
///
/// Writes a configurable payload to the destination instead of touching the
/// network.
#[derive(Debug)]
pub struct MockFetcher {
    /// Recorded fetches.
    fetches: Arc<RwLock<Vec<RecordedFetch>>>,
    /// Bytes written on success.
    payload: Arc<RwLock<Vec<u8>>>,
    /// If set, the next fetch will fail with this error.
    next_error: Arc<RwLock<Option<FetchError>>>,
    /// If set, every fetch fails with this HTTP status.
    http_status: Arc<RwLock<Option<u16>>>,
    /// Simulated fetch duration in milliseconds.
    fetch_duration_ms: Arc<RwLock<u64>>,
}

impl Default for MockFetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl MockFetcher {
    /// Create a new mock fetcher.
    pub fn new() -> Self {
        Self {
            fetches: Arc::new(RwLock::new(Vec::new())),
            payload: Arc::new(RwLock::new(b"source media".to_vec())),
            next_error: Arc::new(RwLock::new(None)),
            http_status: Arc::new(RwLock::new(None)),
            fetch_duration_ms: Arc::new(RwLock::new(0)),
        }
    }

    /// Get all recorded fetches.
    pub async fn recorded_fetches(&self) -> Vec<RecordedFetch> {
        self.fetches.read().await.clone()
    }

    /// Set the bytes written by successful fetches.
    pub async fn set_payload(&self, payload: Vec<u8>) {
        *self.payload.write().await = payload;
    }

    /// Configure the next fetch to fail with the given error.
    pub async fn set_next_error(&self, error: FetchError) {
        *self.next_error.write().await = Some(error);
    }

    /// Make every fetch fail with `status`, or clear it with `None`.
    pub async fn set_http_status(&self, status: Option<u16>) {
        *self.http_status.write().await = status;
    }

    /// Set the simulated fetch duration.
    pub async fn set_fetch_duration(&self, duration: Duration) {
        *self.fetch_duration_ms.write().await = duration.as_millis() as u64;
    }
}

#[async_trait]
impl Fetcher for MockFetcher {
    fn name(&self) -> &str {
        "mock"
    }

    async fn fetch(
        &self,
        url: &Url,
        credential: &Credential,
        destination: &Path,
    ) -> Result<TempArtifact, FetchError> {
        self.fetches.write().await.push(RecordedFetch {
            url: url.clone(),
            credential_version: credential.version,
            sent_cookies: credential.cookie_header(url).is_some(),
        });

        let duration = *self.fetch_duration_ms.read().await;
        if duration > 0 {
            tokio::time::sleep(Duration::from_millis(duration)).await;
        }

        if let Some(err) = self.next_error.write().await.take() {
            return Err(err);
        }
        if let Some(status) = *self.http_status.read().await {
            return Err(FetchError::Http { status });
        }

        let payload = self.payload.read().await.clone();
        tokio::fs::write(destination, &payload).await?;
        Ok(TempArtifact::new(destination, payload.len() as u64))
    }
}
