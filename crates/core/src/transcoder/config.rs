//! Configuration for the transcoder module.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Configuration for the ffmpeg-based transcoder.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscoderConfig {
    /// Path to ffmpeg binary.
    #[serde(default = "default_ffmpeg_path")]
    pub ffmpeg_path: PathBuf,

    /// Wall-clock limit for a single transcode in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// How long to wait for a killed process to be reaped.
    #[serde(default = "default_kill_grace")]
    pub kill_grace_secs: u64,

    /// FFmpeg log level (quiet, panic, fatal, error, warning, info, verbose, debug, trace).
    #[serde(default = "default_log_level")]
    pub ffmpeg_log_level: String,

    /// Audio bitrate for lossy formats.
    #[serde(default = "default_audio_bitrate")]
    pub audio_bitrate_kbps: u32,

    /// Additional ffmpeg arguments inserted before the output path.
    #[serde(default)]
    pub extra_ffmpeg_args: Vec<String>,

    /// Bytes of stderr kept in failure reasons.
    #[serde(default = "default_stderr_excerpt")]
    pub stderr_excerpt_bytes: usize,
}

fn default_ffmpeg_path() -> PathBuf {
    PathBuf::from("ffmpeg")
}

fn default_timeout() -> u64 {
    1800 // 30 minutes
}

fn default_kill_grace() -> u64 {
    5
}

fn default_log_level() -> String {
    "error".to_string()
}

fn default_audio_bitrate() -> u32 {
    192
}

fn default_stderr_excerpt() -> usize {
    2048
}

impl Default for TranscoderConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: default_ffmpeg_path(),
            timeout_secs: default_timeout(),
            kill_grace_secs: default_kill_grace(),
            ffmpeg_log_level: default_log_level(),
            audio_bitrate_kbps: default_audio_bitrate(),
            extra_ffmpeg_args: Vec::new(),
            stderr_excerpt_bytes: default_stderr_excerpt(),
        }
    }
}

impl TranscoderConfig {
    /// Sets the ffmpeg binary path.
    pub fn with_ffmpeg_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.ffmpeg_path = path.into();
        self
    }

    /// Sets the timeout in seconds.
    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = TranscoderConfig::default();
        assert_eq!(config.ffmpeg_path, PathBuf::from("ffmpeg"));
        assert_eq!(config.timeout_secs, 1800);
        assert_eq!(config.kill_grace_secs, 5);
        assert_eq!(config.audio_bitrate_kbps, 192);
        assert_eq!(config.stderr_excerpt_bytes, 2048);
    }

    #[test]
    fn test_config_builder() {
        let config = TranscoderConfig::default()
            .with_ffmpeg_path("/usr/local/bin/ffmpeg")
            .with_timeout(60);

        assert_eq!(config.ffmpeg_path, PathBuf::from("/usr/local/bin/ffmpeg"));
        assert_eq!(config.timeout_secs, 60);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: TranscoderConfig = toml::from_str("timeout_secs = 10").unwrap();
        assert_eq!(config.timeout_secs, 10);
        assert_eq!(config.ffmpeg_log_level, "error");
    }
}
