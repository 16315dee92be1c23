use std::sync::Arc;
use grabber_core::{CookieStore, Config, JobPipeline, SanitizedConfig, Transcoder};

use crate::api::rate_limit::ClientRateLimiter;

/// Shared application state
pub struct AppState {
    config: Config,
    pipeline: Arc<JobPipeline>,
    rate_limiter: Option<ClientRateLimiter>,
}

impl AppState {
    pub fn new(config: Config, pipeline: Arc<JobPipeline>) -> Self {
        let rate_limiter = config
            .rate_limit
            .enabled
            .then(|| {
                ClientRateLimiter::new(
                    config.rate_limit.requests_per_minute,
                    config.rate_limit.requests_per_hour,
                )
            });

        Self {
            config,
            pipeline,
            rate_limiter,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn sanitized_config(&self) -> SanitizedConfig {
        SanitizedConfig::from(&self.config)
    }

    pub fn pipeline(&self) -> &JobPipeline {
        &self.pipeline
    }

    pub fn credentials(&self) -> &CookieStore {
        self.pipeline.credentials()
    }

    pub fn transcoder(&self) -> &Transcoder {
        self.pipeline.transcoder()
    }

    /// `None` when rate limiting is disabled.
    pub fn rate_limiter(&self) -> Option<&ClientRateLimiter> {
        self.rate_limiter.as_ref()
    }
}
