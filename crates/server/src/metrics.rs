//! Prometheus metrics for observability.
//!
//! This module provides metrics for monitoring the grabber server:
//! - HTTP request metrics (latency, counts, rate limiting)
//! - Pipeline pool and job state gauges (collected on scrape)
//! - Credential version (collected on scrape)

use once_cell::sync::Lazy;
use prometheus::{
    self, Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, IntGaugeVec,
    Opts, Registry, TextEncoder,
};
use regex_lite::Regex;

/// Global metrics registry.
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    register_metrics(&registry);
    registry
});

// =============================================================================
// HTTP Request Metrics
// =============================================================================

/// HTTP request duration in seconds.
pub static HTTP_REQUEST_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "grabber_http_request_duration_seconds",
            "HTTP request duration in seconds",
        )
        .buckets(vec![
            0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
        ]),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests total count.
pub static HTTP_REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("grabber_http_requests_total", "Total HTTP requests"),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests currently in flight.
pub static HTTP_REQUESTS_IN_FLIGHT: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "grabber_http_requests_in_flight",
        "Number of HTTP requests currently being processed",
    )
    .unwrap()
});

/// Requests refused by the per-client rate limiter.
pub static RATE_LIMITED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "grabber_rate_limited_requests_total",
        "Total requests rejected by the rate limiter",
    )
    .unwrap()
});

// =============================================================================
// Pipeline Metrics (collected dynamically)
// =============================================================================

/// Pipeline running state (1 = running, 0 = stopped).
pub static PIPELINE_RUNNING: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "grabber_pipeline_running",
        "Whether the job pipeline is accepting jobs (1) or not (0)",
    )
    .unwrap()
});

/// Jobs holding a pipeline slot.
pub static PIPELINE_ACTIVE_JOBS: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "grabber_pipeline_active_jobs",
        "Number of jobs currently fetching or transcoding",
    )
    .unwrap()
});

/// Jobs admitted and waiting for a slot.
pub static PIPELINE_QUEUED_JOBS: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "grabber_pipeline_queued_jobs",
        "Number of admitted jobs waiting for a slot",
    )
    .unwrap()
});

/// Known jobs by current state.
pub static JOBS_BY_STATE: Lazy<IntGaugeVec> = Lazy::new(|| {
    IntGaugeVec::new(
        Opts::new("grabber_jobs_by_state", "Current job count by state"),
        &["state"],
    )
    .unwrap()
});

/// Version of the loaded session credential.
pub static CREDENTIAL_VERSION: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "grabber_credential_version",
        "Version of the currently loaded cookie file (0 = none)",
    )
    .unwrap()
});

// =============================================================================
// Registration
// =============================================================================

fn register_metrics(registry: &Registry) {
    // HTTP
    registry
        .register(Box::new(HTTP_REQUEST_DURATION.clone()))
        .unwrap();
    registry
        .register(Box::new(HTTP_REQUESTS_TOTAL.clone()))
        .unwrap();
    registry
        .register(Box::new(HTTP_REQUESTS_IN_FLIGHT.clone()))
        .unwrap();
    registry
        .register(Box::new(RATE_LIMITED_TOTAL.clone()))
        .unwrap();

    // Pipeline
    registry
        .register(Box::new(PIPELINE_RUNNING.clone()))
        .unwrap();
    registry
        .register(Box::new(PIPELINE_ACTIVE_JOBS.clone()))
        .unwrap();
    registry
        .register(Box::new(PIPELINE_QUEUED_JOBS.clone()))
        .unwrap();
    registry.register(Box::new(JOBS_BY_STATE.clone())).unwrap();
    registry
        .register(Box::new(CREDENTIAL_VERSION.clone()))
        .unwrap();

    // Core metrics (credentials, fetcher, transcoder, pipeline)
    for metric in grabber_core::metrics::all_metrics() {
        registry.register(metric).unwrap();
    }
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}

/// Collect dynamic metrics from current application state.
///
/// Called before encoding so gauges reflect the pipeline at scrape time.
pub async fn collect_dynamic_metrics(state: &crate::state::AppState) {
    let status = state.pipeline().status_summary().await;
    PIPELINE_RUNNING.set(i64::from(status.running));
    PIPELINE_ACTIVE_JOBS.set(status.pool.active_jobs as i64);
    PIPELINE_QUEUED_JOBS.set(status.pool.queued_jobs as i64);

    for (job_state, count) in [
        ("pending", status.jobs.pending),
        ("fetching", status.jobs.fetching),
        ("transcoding", status.jobs.transcoding),
        ("done", status.jobs.done),
        ("failed", status.jobs.failed),
    ] {
        JOBS_BY_STATE
            .with_label_values(&[job_state])
            .set(count as i64);
    }

    CREDENTIAL_VERSION.set(state.credentials().version().await as i64);
}

static UUID_SEGMENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}")
        .unwrap()
});

static NUMERIC_SEGMENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"/\d+(/|$)").unwrap());

/// Normalize a path for metric labels (replace IDs with placeholders).
pub fn normalize_path(path: &str) -> String {
    let result = UUID_SEGMENT.replace_all(path, "{id}");
    let result = NUMERIC_SEGMENT.replace_all(&result, "/{id}$1");
    result.to_string()
}
