//! Filesystem-backed job artifacts.
//!
//! Every job gets its own directory under the temp root. The fetcher writes
//! into it, the transcoder reads from and writes next to it, and the
//! pipeline removes the whole directory exactly once when the job ends.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// A byte blob on disk produced by a fetch or transcode step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TempArtifact {
    pub path: PathBuf,
    pub size_bytes: u64,
}

impl TempArtifact {
    pub fn new(path: impl Into<PathBuf>, size_bytes: u64) -> Self {
        Self {
            path: path.into(),
            size_bytes,
        }
    }
}

/// Per-job scratch directory.
///
/// Removal happens through [`cleanup`](Self::cleanup). If the workspace is
/// dropped without it (a panic or an aborted task), `Drop` removes the
/// directory synchronously instead.
#[derive(Debug)]
pub struct JobWorkspace {
    dir: PathBuf,
    cleaned: bool,
}

impl JobWorkspace {
    /// Creates `<root>/<job_id>/`.
    pub async fn create(root: &Path, job_id: &str) -> std::io::Result<Self> {
        let dir = root.join(job_id);
        tokio::fs::create_dir_all(&dir).await?;
        Ok(Self {
            dir,
            cleaned: false,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Final location of the fetched source.
    pub fn source_path(&self) -> PathBuf {
        self.dir.join("source")
    }

    /// Location of the transcoded output for `extension`.
    pub fn output_path(&self, extension: &str) -> PathBuf {
        self.dir.join(format!("output.{}", extension))
    }

    /// Removes the directory and everything in it.
    ///
    /// Returns `false` when removal failed; the failure is logged, never raised.
    pub async fn cleanup(mut self) -> bool {
        self.cleaned = true;
        match tokio::fs::remove_dir_all(&self.dir).await {
            Ok(()) => {
                debug!(dir = %self.dir.display(), "Removed job workspace");
                true
            }
            Err(e) if e.kind() == ErrorKind::NotFound => true,
            Err(e) => {
                warn!(dir = %self.dir.display(), error = %e, "Failed to remove job workspace");
                false
            }
        }
    }
}

impl Drop for JobWorkspace {
    fn drop(&mut self) {
        if self.cleaned {
            return;
        }
        if let Err(e) = std::fs::remove_dir_all(&self.dir) {
            if e.kind() != ErrorKind::NotFound {
                warn!(dir = %self.dir.display(), error = %e, "Failed to remove abandoned job workspace");
            }
        }
    }
}

/// Deletes a file, ignoring a missing one. Used for partial outputs.
pub(crate) async fn remove_quietly(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        if e.kind() != ErrorKind::NotFound {
            warn!(path = %path.display(), error = %e, "Failed to remove partial file");
        }
    }
}
