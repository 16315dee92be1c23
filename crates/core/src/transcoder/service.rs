//! Outcome mapping and output verification on top of a [`MediaEngine`].

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::artifact::{remove_quietly, TempArtifact};
use crate::metrics::TRANSCODE_DURATION;

use super::config::TranscoderConfig;
use super::engine::MediaEngine;
use super::error::TranscodeError;
use super::types::{ExitOutcome, OutputFormat, TranscodeInvocation};

/// Converts fetched sources with a [`MediaEngine`].
///
/// The input artifact is never modified or removed. A failed run leaves no
/// output file behind.
pub struct Transcoder {
    engine: Arc<dyn MediaEngine>,
    config: TranscoderConfig,
    /// Last availability result and when it was taken.
    availability: Mutex<Option<(Instant, Result<(), String>)>>,
}

impl Transcoder {
    pub fn new(engine: Arc<dyn MediaEngine>, config: TranscoderConfig) -> Self {
        Self {
            engine,
            config,
            availability: Mutex::new(None),
        }
    }

    /// Name of the underlying engine.
    pub fn engine_name(&self) -> &str {
        self.engine.name()
    }

    pub fn config(&self) -> &TranscoderConfig {
        &self.config
    }

    /// Checks that the engine is reachable.
    pub async fn check_available(&self) -> Result<(), TranscodeError> {
        self.engine.check_available().await
    }

    /// Like [`check_available`](Self::check_available), but reuses a result
    /// younger than `max_age`.
    ///
    /// Concurrent callers wait for a single in-flight check.
    pub async fn check_available_cached(&self, max_age: Duration) -> Result<(), String> {
        let mut cached = self.availability.lock().await;
        if let Some((checked_at, result)) = cached.as_ref() {
            if checked_at.elapsed() < max_age {
                return result.clone();
            }
        }

        let result = self.engine.check_available().await.map_err(|e| e.to_string());
        *cached = Some((Instant::now(), result.clone()));
        result
    }

    /// Output location for `input` in `format`: a sibling `output.<ext>`.
    pub fn output_path_for(input: &Path, format: OutputFormat) -> PathBuf {
        input.with_file_name(format!("output.{}", format.extension()))
    }

    /// Transcodes `input` into `format`.
    pub async fn transcode(
        &self,
        input: &TempArtifact,
        format: OutputFormat,
    ) -> Result<TempArtifact, TranscodeError> {
        if !tokio::fs::try_exists(&input.path).await? {
            return Err(TranscodeError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("input {} does not exist", input.path.display()),
            )));
        }

        let invocation = TranscodeInvocation {
            input: input.path.clone(),
            output: Self::output_path_for(&input.path, format),
            format,
            timeout: Duration::from_secs(self.config.timeout_secs),
        };

        let start = Instant::now();
        let result = self.run(&invocation).await;

        let label = match &result {
            Ok(_) => "success",
            Err(TranscodeError::Timeout { .. }) => "timeout",
            Err(_) => "failed",
        };
        TRANSCODE_DURATION
            .with_label_values(&[label])
            .observe(start.elapsed().as_secs_f64());

        if result.is_err() {
            remove_quietly(&invocation.output).await;
        }
        result
    }

    async fn run(&self, invocation: &TranscodeInvocation) -> Result<TempArtifact, TranscodeError> {
        match self.engine.transcode(invocation).await? {
            ExitOutcome::TimedOut => {
                warn!(
                    engine = self.engine.name(),
                    timeout_secs = self.config.timeout_secs,
                    "Transcode timed out"
                );
                Err(TranscodeError::Timeout {
                    timeout_secs: self.config.timeout_secs,
                })
            }
            ExitOutcome::Exited { code: Some(0), .. } => {
                let size = match tokio::fs::metadata(&invocation.output).await {
                    Ok(meta) if meta.is_file() && meta.len() > 0 => meta.len(),
                    _ => {
                        return Err(TranscodeError::OutputMissing {
                            path: invocation.output.clone(),
                        })
                    }
                };
                debug!(
                    output = %invocation.output.display(),
                    bytes = size,
                    format = %invocation.format,
                    "Transcode complete"
                );
                Ok(TempArtifact::new(&invocation.output, size))
            }
            ExitOutcome::Exited { code, stderr } => Err(TranscodeError::failed(
                code,
                stderr_excerpt(&stderr, self.config.stderr_excerpt_bytes),
            )),
        }
    }
}

/// Last `limit` bytes of `stderr` as trimmed text.
fn stderr_excerpt(stderr: &[u8], limit: usize) -> String {
    let start = stderr.len().saturating_sub(limit);
    String::from_utf8_lossy(&stderr[start..]).trim().to_string()
}
