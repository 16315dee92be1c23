//! FFmpeg-based media engine.

use async_trait::async_trait;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

use super::config::TranscoderConfig;
use super::engine::MediaEngine;
use super::error::TranscodeError;
use super::process::run_with_timeout;
use super::types::{ExitOutcome, TranscodeInvocation};

/// Limit for the `-version` availability check.
const VERSION_CHECK_TIMEOUT: Duration = Duration::from_secs(5);

/// FFmpeg-based engine implementation.
pub struct FfmpegEngine {
    config: TranscoderConfig,
}

impl FfmpegEngine {
    /// Creates a new FFmpeg engine with the given configuration.
    pub fn new(config: TranscoderConfig) -> Self {
        Self { config }
    }

    /// Creates an engine with default configuration.
    pub fn with_defaults() -> Self {
        Self::new(TranscoderConfig::default())
    }

    pub fn config(&self) -> &TranscoderConfig {
        &self.config
    }

    fn kill_grace(&self) -> Duration {
        Duration::from_secs(self.config.kill_grace_secs)
    }

    /// Builds ffmpeg arguments for one invocation.
    fn build_args(&self, invocation: &TranscodeInvocation) -> Vec<String> {
        let mut args = vec![
            "-y".to_string(), // Overwrite output
            "-hide_banner".to_string(),
            "-nostdin".to_string(),
            "-loglevel".to_string(),
            self.config.ffmpeg_log_level.clone(),
            "-i".to_string(),
            invocation.input.to_string_lossy().to_string(),
        ];

        args.extend(invocation.format.codec_args(self.config.audio_bitrate_kbps));

        // Extra args
        args.extend(self.config.extra_ffmpeg_args.iter().cloned());

        // Output
        args.push(invocation.output.to_string_lossy().to_string());

        args
    }

    fn map_io_error(&self, e: std::io::Error) -> TranscodeError {
        if e.kind() == std::io::ErrorKind::NotFound {
            TranscodeError::EngineNotFound {
                path: self.config.ffmpeg_path.clone(),
            }
        } else {
            TranscodeError::Io(e)
        }
    }
}

#[async_trait]
impl MediaEngine for FfmpegEngine {
    fn name(&self) -> &str {
        "ffmpeg"
    }

    async fn check_available(&self) -> Result<(), TranscodeError> {
        let mut command = Command::new(&self.config.ffmpeg_path);
        command.arg("-version");

        let outcome = run_with_timeout(command, VERSION_CHECK_TIMEOUT, self.kill_grace())
            .await
            .map_err(|e| self.map_io_error(e))?;

        match outcome {
            ExitOutcome::Exited { code: Some(0), .. } => Ok(()),
            ExitOutcome::Exited { code, stderr } => Err(TranscodeError::failed(
                code,
                String::from_utf8_lossy(&stderr).trim().to_string(),
            )),
            ExitOutcome::TimedOut => Err(TranscodeError::Timeout {
                timeout_secs: VERSION_CHECK_TIMEOUT.as_secs(),
            }),
        }
    }

    async fn transcode(
        &self,
        invocation: &TranscodeInvocation,
    ) -> Result<ExitOutcome, TranscodeError> {
        let args = self.build_args(invocation);
        debug!(
            ffmpeg = %self.config.ffmpeg_path.display(),
            format = %invocation.format,
            args = ?args,
            "Running ffmpeg"
        );

        let mut command = Command::new(&self.config.ffmpeg_path);
        command.args(&args);

        run_with_timeout(command, invocation.timeout, self.kill_grace())
            .await
            .map_err(|e| self.map_io_error(e))
    }
}
