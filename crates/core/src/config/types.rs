use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::PathBuf;

use crate::fetcher::FetcherConfig;
use crate::pipeline::PipelineConfig;
use crate::transcoder::TranscoderConfig;

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub credentials: CredentialsConfig,
    #[serde(default)]
    pub fetcher: FetcherConfig,
    #[serde(default)]
    pub transcoder: TranscoderConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::from([0, 0, 0, 0])
}

fn default_port() -> u16 {
    8000
}

/// Session cookie file configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CredentialsConfig {
    /// Netscape-format cookie jar used for authenticated fetches.
    #[serde(default = "default_cookies_path")]
    pub cookies_path: PathBuf,
    /// Poll interval for reloading the cookie file on change (0 disables).
    #[serde(default)]
    pub watch_interval_secs: u64,
}

impl Default for CredentialsConfig {
    fn default() -> Self {
        Self {
            cookies_path: default_cookies_path(),
            watch_interval_secs: 0,
        }
    }
}

fn default_cookies_path() -> PathBuf {
    PathBuf::from("cookies.txt")
}

/// Per-client request rate limiting
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RateLimitConfig {
    #[serde(default = "default_rate_limit_enabled")]
    pub enabled: bool,
    #[serde(default = "default_requests_per_minute")]
    pub requests_per_minute: u32,
    /// Second, slower bucket per client (0 disables).
    #[serde(default = "default_requests_per_hour")]
    pub requests_per_hour: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: default_rate_limit_enabled(),
            requests_per_minute: default_requests_per_minute(),
            requests_per_hour: default_requests_per_hour(),
        }
    }
}

fn default_rate_limit_enabled() -> bool {
    true
}

fn default_requests_per_minute() -> u32 {
    30
}

fn default_requests_per_hour() -> u32 {
    500
}

/// Log output configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Sanitized config for API responses.
///
/// Cookie contents never leave the process; only where they are read from.
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub server: ServerConfig,
    pub credentials: SanitizedCredentialsConfig,
    pub fetcher: SanitizedFetcherConfig,
    pub transcoder: SanitizedTranscoderConfig,
    pub pipeline: PipelineConfig,
    pub rate_limit: RateLimitConfig,
}

#[derive(Debug, Clone, Serialize)]
pub struct SanitizedCredentialsConfig {
    pub cookies_path: String,
    pub watching: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct SanitizedFetcherConfig {
    pub idle_timeout_secs: u64,
    pub max_download_bytes: u64,
    pub max_retries: u32,
    pub block_private_hosts: bool,
    /// Proxy addresses are credentials too; only their count is exposed.
    pub proxy_count: usize,
    pub user_agent_pool: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct SanitizedTranscoderConfig {
    pub ffmpeg_path: String,
    pub timeout_secs: u64,
    pub audio_bitrate_kbps: u32,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            server: config.server.clone(),
            credentials: SanitizedCredentialsConfig {
                cookies_path: config.credentials.cookies_path.display().to_string(),
                watching: config.credentials.watch_interval_secs > 0,
            },
            fetcher: SanitizedFetcherConfig {
                idle_timeout_secs: config.fetcher.idle_timeout_secs,
                max_download_bytes: config.fetcher.max_download_bytes,
                max_retries: config.fetcher.max_retries,
                block_private_hosts: config.fetcher.block_private_hosts,
                proxy_count: config.fetcher.proxies.len(),
                user_agent_pool: config.fetcher.user_agents.len(),
            },
            transcoder: SanitizedTranscoderConfig {
                ffmpeg_path: config.transcoder.ffmpeg_path.display().to_string(),
                timeout_secs: config.transcoder.timeout_secs,
                audio_bitrate_kbps: config.transcoder.audio_bitrate_kbps,
            },
            pipeline: config.pipeline.clone(),
            rate_limit: config.rate_limit.clone(),
        }
    }
}
