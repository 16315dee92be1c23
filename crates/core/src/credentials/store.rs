//! Versioned, cached cookie store.

use chrono::Utc;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::sync::{watch, Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::metrics::CREDENTIAL_RELOADS;

use super::error::CredentialError;
use super::netscape::parse_netscape;
use super::types::{Cookie, Credential};

/// Holds the last successfully loaded [`Credential`].
///
/// Readers share the current version without touching the filesystem.
/// Loads are serialized so two concurrent reloads cannot interleave and
/// publish versions out of order.
pub struct CookieStore {
    path: PathBuf,
    current: RwLock<Option<Arc<Credential>>>,
    reload_lock: Mutex<u64>,
}

impl CookieStore {
    /// Creates an empty store backed by `path`. Nothing is read until [`load`](Self::load).
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            current: RwLock::new(None),
            reload_lock: Mutex::new(0),
        }
    }

    /// Path of the backing cookie file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the cookie file and publishes it as the current credential.
    pub async fn load(&self) -> Result<Arc<Credential>, CredentialError> {
        self.reload().await
    }

    /// Re-reads the cookie file.
    ///
    /// On failure the previously loaded version stays current.
    pub async fn reload(&self) -> Result<Arc<Credential>, CredentialError> {
        let mut last_version = self.reload_lock.lock().await;

        let cookies = match read_cookies(&self.path).await {
            Ok(cookies) => cookies,
            Err(e) => {
                CREDENTIAL_RELOADS.with_label_values(&["failed"]).inc();
                warn!(path = %self.path.display(), error = %e, "Credential reload failed");
                return Err(e);
            }
        };

        *last_version += 1;
        let credential = Arc::new(Credential {
            version: *last_version,
            loaded_at: Utc::now(),
            source: self.path.clone(),
            cookies,
        });

        *self.current.write().await = Some(Arc::clone(&credential));
        CREDENTIAL_RELOADS.with_label_values(&["ok"]).inc();
        info!(
            version = credential.version,
            cookies = credential.len(),
            "Credential loaded"
        );

        Ok(credential)
    }

    /// Returns the cached credential without re-reading the file.
    pub async fn credential(&self) -> Result<Arc<Credential>, CredentialError> {
        self.current
            .read()
            .await
            .clone()
            .ok_or(CredentialError::NotLoaded)
    }

    /// Version of the cached credential, 0 when nothing is loaded.
    pub async fn version(&self) -> u64 {
        self.current
            .read()
            .await
            .as_ref()
            .map(|c| c.version)
            .unwrap_or(0)
    }

    /// Verifies the backing file is currently loadable without replacing the cache.
    pub async fn check(&self) -> Result<usize, CredentialError> {
        read_cookies(&self.path).await.map(|cookies| cookies.len())
    }
}

async fn read_cookies(path: &Path) -> Result<Vec<Cookie>, CredentialError> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| CredentialError::unavailable(path, e.to_string()))?;

    let cookies = parse_netscape(&content);
    if cookies.is_empty() {
        return Err(CredentialError::Empty {
            path: path.to_path_buf(),
        });
    }
    Ok(cookies)
}

async fn modified_at(path: &Path) -> Option<SystemTime> {
    tokio::fs::metadata(path).await.ok()?.modified().ok()
}

/// Polls the cookie file and reloads the store whenever its mtime changes.
///
/// Runs until `shutdown` flips to `true`. Reload failures are logged and the
/// previous credential stays in place.
pub fn spawn_watcher(
    store: Arc<CookieStore>,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut last_seen = modified_at(store.path()).await;
        let mut ticker = tokio::time::interval(interval);
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        break;
                    }
                    continue;
                }
            }

            let seen = modified_at(store.path()).await;
            if seen.is_none() || seen == last_seen {
                continue;
            }

            debug!(path = %store.path().display(), "Cookie file changed, reloading");
            if store.reload().await.is_ok() {
                last_seen = seen;
            }
        }

        debug!("Credential watcher stopped");
    })
}
