//! HTTP fetcher built on reqwest.

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::header::{COOKIE, USER_AGENT};
use reqwest::{Client, ClientBuilder, Url};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use crate::artifact::{remove_quietly, TempArtifact};
use crate::credentials::Credential;
use crate::metrics::FETCH_BYTES;

use super::config::FetcherConfig;
use super::error::FetchError;
use super::proxy::ProxyRotator;
use super::traits::Fetcher;
use super::url_guard::{guard_rejection, redirect_policy, validate_source_url, PublicResolver};

/// Streams sources over HTTP(S) into the job workspace.
///
/// Bytes land in `<destination>.part` first and are renamed into place only
/// after the whole body arrived under the size cap. With proxies
/// configured, each attempt goes through the next proxy in rotation.
pub struct HttpFetcher {
    client: Client,
    proxies: ProxyRotator,
    config: FetcherConfig,
}

impl HttpFetcher {
    /// Creates a new fetcher with the given configuration.
    pub fn new(config: FetcherConfig) -> Result<Self, FetchError> {
        Self::with_builder(config, Client::builder)
    }

    /// Builds the direct client and one client per proxy, each from `base()`.
    fn with_builder(
        config: FetcherConfig,
        base: impl Fn() -> ClientBuilder,
    ) -> Result<Self, FetchError> {
        let block_private = config.block_private_hosts;
        let configure = |builder: ClientBuilder, connect_timeout_secs: u64| {
            builder
                .connect_timeout(Duration::from_secs(connect_timeout_secs))
                .user_agent(config.user_agent.clone())
                .redirect(redirect_policy(block_private))
        };
        let setup = |e: reqwest::Error| FetchError::Setup(e.to_string());

        // Proxied targets are resolved by the proxy, so only the direct
        // client filters resolved addresses.
        let mut direct = configure(base(), config.connect_timeout_secs);
        if block_private {
            direct = direct.dns_resolver(Arc::new(PublicResolver));
        }
        let client = direct.build().map_err(setup)?;

        let proxies = ProxyRotator::new(&config.proxies, |proxy| {
            configure(base().proxy(proxy), config.proxy_timeout_secs)
                .build()
                .map_err(setup)
        })?;

        Ok(Self {
            client,
            proxies,
            config,
        })
    }

    /// Returns the fetcher configuration.
    pub fn config(&self) -> &FetcherConfig {
        &self.config
    }

    fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.config.idle_timeout_secs)
    }

    fn timeout_error(&self) -> FetchError {
        FetchError::Timeout {
            idle_secs: self.config.idle_timeout_secs,
        }
    }

    fn map_request_error(&self, e: reqwest::Error) -> FetchError {
        if let Some(rejected) = guard_rejection(&e) {
            rejected
        } else if e.is_timeout() {
            self.timeout_error()
        } else {
            FetchError::from(e)
        }
    }

    async fn fetch_once(
        &self,
        client: &Client,
        url: &Url,
        credential: &Credential,
        destination: &Path,
    ) -> Result<TempArtifact, FetchError> {
        let partial = partial_path(destination);

        let written = match self.download(client, url, credential, &partial).await {
            Ok(written) => written,
            Err(e) => {
                remove_quietly(&partial).await;
                return Err(e);
            }
        };

        if let Err(e) = tokio::fs::rename(&partial, destination).await {
            remove_quietly(&partial).await;
            return Err(FetchError::Io(e));
        }

        Ok(TempArtifact::new(destination, written))
    }

    async fn download(
        &self,
        client: &Client,
        url: &Url,
        credential: &Credential,
        partial: &Path,
    ) -> Result<u64, FetchError> {
        let limit = self.config.max_download_bytes;
        let idle = self.idle_timeout();

        let mut request = client
            .get(url.clone())
            .header(USER_AGENT, self.config.pick_user_agent());
        if let Some(cookies) = credential.cookie_header(url) {
            request = request.header(COOKIE, cookies);
        }

        let response = tokio::time::timeout(idle, request.send())
            .await
            .map_err(|_| self.timeout_error())?
            .map_err(|e| self.map_request_error(e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Http {
                status: status.as_u16(),
            });
        }

        if let Some(length) = response.content_length() {
            if length > limit {
                debug!(url = %url, length, limit, "Rejecting oversized source before download");
                return Err(FetchError::TooLarge { limit_bytes: limit });
            }
        }

        let mut file = tokio::fs::File::create(partial).await?;
        let mut stream = response.bytes_stream();
        let mut written: u64 = 0;

        loop {
            let next = tokio::time::timeout(idle, stream.next())
                .await
                .map_err(|_| self.timeout_error())?;

            let Some(chunk) = next else {
                break;
            };
            let chunk = chunk.map_err(|e| self.map_request_error(e))?;

            written += chunk.len() as u64;
            if written > limit {
                return Err(FetchError::TooLarge { limit_bytes: limit });
            }
            file.write_all(&chunk).await?;
        }

        file.flush().await?;
        Ok(written)
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    fn name(&self) -> &str {
        "http"
    }

    fn validate_url(&self, raw: &str) -> Result<Url, FetchError> {
        validate_source_url(raw, self.config.block_private_hosts)
    }

    async fn fetch(
        &self,
        url: &Url,
        credential: &Credential,
        destination: &Path,
    ) -> Result<TempArtifact, FetchError> {
        let url = self.validate_url(url.as_str())?;
        let mut attempt: u32 = 0;

        loop {
            let route = self.proxies.next();
            let client = route.map_or(&self.client, |(_, client)| client);
            let proxy = route.and_then(|(idx, _)| self.proxies.label(idx));

            match self.fetch_once(client, &url, credential, destination).await {
                Ok(artifact) => {
                    if let Some((idx, _)) = route {
                        self.proxies.mark_ok(idx);
                    }
                    FETCH_BYTES.inc_by(artifact.size_bytes);
                    debug!(
                        url = %url,
                        bytes = artifact.size_bytes,
                        credential_version = credential.version,
                        proxy = proxy.unwrap_or("direct"),
                        "Fetch complete"
                    );
                    return Ok(artifact);
                }
                Err(e) => {
                    if let Some((idx, _)) = route {
                        if matches!(e, FetchError::Connection(_) | FetchError::Timeout { .. }) {
                            self.proxies.mark_failed(idx);
                        }
                    }
                    if !e.is_retryable() || attempt >= self.config.max_retries {
                        return Err(e);
                    }
                    attempt += 1;
                    warn!(
                        url = %url,
                        attempt,
                        max_retries = self.config.max_retries,
                        proxy = proxy.unwrap_or("direct"),
                        error = %e,
                        "Fetch failed, retrying"
                    );
                    tokio::time::sleep(Duration::from_millis(self.config.retry_delay_ms)).await;
                }
            }
        }
    }
}

fn partial_path(destination: &Path) -> PathBuf {
    let mut name = destination.as_os_str().to_owned();
    name.push(".part");
    PathBuf::from(name)
}
