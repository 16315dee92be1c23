//! Configuration for the fetcher module.

use rand::seq::IndexedRandom;
use serde::{Deserialize, Serialize};

/// Configuration for the HTTP fetcher.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetcherConfig {
    /// Maximum time without receiving any bytes before the fetch fails.
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,

    /// TCP/TLS connect timeout.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Hard cap on downloaded bytes per source.
    #[serde(default = "default_max_download_bytes")]
    pub max_download_bytes: u64,

    /// User-Agent header sent with every request.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Pool of User-Agent strings, one picked at random per request.
    /// Empty means `user_agent` is always sent.
    #[serde(default)]
    pub user_agents: Vec<String>,

    /// Outbound proxies tried in rotation. Entries without a scheme are
    /// treated as `http://`. Empty connects directly.
    #[serde(default)]
    pub proxies: Vec<String>,

    /// Connect timeout when going through a proxy.
    #[serde(default = "default_proxy_timeout")]
    pub proxy_timeout_secs: u64,

    /// Retries for transient failures. 0 disables retrying.
    #[serde(default)]
    pub max_retries: u32,

    /// Delay between retries in milliseconds.
    #[serde(default = "default_retry_delay")]
    pub retry_delay_ms: u64,

    /// Reject loopback, private and link-local hosts.
    #[serde(default = "default_block_private_hosts")]
    pub block_private_hosts: bool,
}

fn default_idle_timeout() -> u64 {
    30
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_max_download_bytes() -> u64 {
    2 * 1024 * 1024 * 1024 // 2 GiB
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".to_string()
}

fn default_proxy_timeout() -> u64 {
    10
}

fn default_retry_delay() -> u64 {
    1000
}

fn default_block_private_hosts() -> bool {
    true
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            idle_timeout_secs: default_idle_timeout(),
            connect_timeout_secs: default_connect_timeout(),
            max_download_bytes: default_max_download_bytes(),
            user_agent: default_user_agent(),
            user_agents: Vec::new(),
            proxies: Vec::new(),
            proxy_timeout_secs: default_proxy_timeout(),
            max_retries: 0,
            retry_delay_ms: default_retry_delay(),
            block_private_hosts: default_block_private_hosts(),
        }
    }
}

impl FetcherConfig {
    /// Sets the download cap.
    pub fn with_max_bytes(mut self, max: u64) -> Self {
        self.max_download_bytes = max;
        self
    }

    /// Sets the idle timeout in seconds.
    pub fn with_idle_timeout(mut self, secs: u64) -> Self {
        self.idle_timeout_secs = secs;
        self
    }

    /// Allows or blocks private hosts.
    pub fn with_private_hosts_blocked(mut self, blocked: bool) -> Self {
        self.block_private_hosts = blocked;
        self
    }

    /// Sets retry count and delay.
    pub fn with_retries(mut self, max_retries: u32, delay_ms: u64) -> Self {
        self.max_retries = max_retries;
        self.retry_delay_ms = delay_ms;
        self
    }

    /// Sets the User-Agent pool.
    pub fn with_user_agents(mut self, agents: Vec<String>) -> Self {
        self.user_agents = agents;
        self
    }

    /// Sets the proxy list.
    pub fn with_proxies(mut self, proxies: Vec<String>) -> Self {
        self.proxies = proxies;
        self
    }

    /// User-Agent for the next request.
    pub fn pick_user_agent(&self) -> &str {
        self.user_agents
            .choose(&mut rand::rng())
            .map(String::as_str)
            .unwrap_or(&self.user_agent)
    }
}
