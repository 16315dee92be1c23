use super::{types::Config, ConfigError};
use crate::fetcher::parse_proxy;

/// Validate configuration
/// Currently validates:
/// - Server port is not 0
/// - Pipeline allows at least one concurrent job
/// - Download cap and timeouts are non-zero
/// - Proxy entries parse
/// - Rate limit is non-zero when enabled
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "server.port cannot be 0".to_string(),
        ));
    }

    if config.pipeline.max_concurrent_jobs == 0 {
        return Err(ConfigError::ValidationError(
            "pipeline.max_concurrent_jobs must be at least 1".to_string(),
        ));
    }

    if config.fetcher.max_download_bytes == 0 {
        return Err(ConfigError::ValidationError(
            "fetcher.max_download_bytes cannot be 0".to_string(),
        ));
    }

    if config.fetcher.idle_timeout_secs == 0 {
        return Err(ConfigError::ValidationError(
            "fetcher.idle_timeout_secs cannot be 0".to_string(),
        ));
    }

    if config.fetcher.connect_timeout_secs == 0 {
        return Err(ConfigError::ValidationError(
            "fetcher.connect_timeout_secs cannot be 0".to_string(),
        ));
    }

    if !config.fetcher.proxies.is_empty() && config.fetcher.proxy_timeout_secs == 0 {
        return Err(ConfigError::ValidationError(
            "fetcher.proxy_timeout_secs cannot be 0 when proxies are configured".to_string(),
        ));
    }

    for proxy in &config.fetcher.proxies {
        parse_proxy(proxy)
            .map_err(|e| ConfigError::ValidationError(format!("fetcher.proxies: {}", e)))?;
    }

    if config.transcoder.timeout_secs == 0 {
        return Err(ConfigError::ValidationError(
            "transcoder.timeout_secs cannot be 0".to_string(),
        ));
    }

    if config.rate_limit.enabled && config.rate_limit.requests_per_minute == 0 {
        return Err(ConfigError::ValidationError(
            "rate_limit.requests_per_minute cannot be 0 when rate limiting is enabled"
                .to_string(),
        ));
    }

    if config.pipeline.temp_dir == config.pipeline.data_dir {
        return Err(ConfigError::ValidationError(
            "pipeline.temp_dir and pipeline.data_dir must differ".to_string(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_default_config() {
        assert!(validate_config(&Config::default()).is_ok());
    }

    #[test]
    fn test_validate_port_zero_fails() {
        let mut config = Config::default();
        config.server.port = 0;
        let result = validate_config(&config);
        assert!(matches!(result, Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn test_validate_zero_concurrency_fails() {
        let mut config = Config::default();
        config.pipeline.max_concurrent_jobs = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_zero_download_cap_fails() {
        let mut config = Config::default();
        config.fetcher.max_download_bytes = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_zero_connect_timeout_fails() {
        let mut config = Config::default();
        config.fetcher.connect_timeout_secs = 0;
        let result = validate_config(&config);
        assert!(matches!(
            result,
            Err(ConfigError::ValidationError(ref msg)) if msg.contains("connect_timeout_secs")
        ));
    }

    #[test]
    fn test_validate_proxy_settings() {
        let mut config = Config::default();
        config.fetcher.proxy_timeout_secs = 0;
        // Unused without proxies
        assert!(validate_config(&config).is_ok());

        config.fetcher.proxies = vec!["proxy.example.com:3128".to_string()];
        assert!(validate_config(&config).is_err());

        config.fetcher.proxy_timeout_secs = 5;
        assert!(validate_config(&config).is_ok());

        config.fetcher.proxies.push("ftp://proxy.example.com:21".to_string());
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_rate_limit_zero_only_when_enabled() {
        let mut config = Config::default();
        config.rate_limit.requests_per_minute = 0;
        assert!(validate_config(&config).is_err());

        config.rate_limit.enabled = false;
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_validate_shared_dirs_fail() {
        let mut config = Config::default();
        config.pipeline.data_dir = config.pipeline.temp_dir.clone();
        assert!(validate_config(&config).is_err());
    }
}
