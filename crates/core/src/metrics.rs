//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Credentials (reloads)
//! - Jobs (admission, outcomes)
//! - Fetch and transcode stages

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts};

// =============================================================================
// Credential Metrics
// =============================================================================

/// Credential loads by result.
pub static CREDENTIAL_RELOADS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "grabber_credential_reloads_total",
            "Total cookie file loads",
        ),
        &["result"], // "ok", "failed"
    )
    .unwrap()
});

// =============================================================================
// Job Metrics
// =============================================================================

/// Jobs accepted into the pipeline.
pub static JOBS_SUBMITTED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new("grabber_jobs_submitted_total", "Total jobs accepted").unwrap()
});

/// Jobs refused at submission, by reason.
pub static JOBS_REJECTED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("grabber_jobs_rejected_total", "Total jobs refused at submission"),
        &["reason"], // "saturated", "invalid", "not_running"
    )
    .unwrap()
});

/// Jobs reaching a terminal state, by outcome.
pub static JOBS_FINISHED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("grabber_jobs_finished_total", "Total jobs finished"),
        &["result"], // "succeeded", "failed", "cancelled"
    )
    .unwrap()
});

/// Job workspaces that could not be removed.
pub static CLEANUP_FAILURES: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "grabber_cleanup_failures_total",
        "Total job workspaces that failed to be removed",
    )
    .unwrap()
});

// =============================================================================
// Stage Metrics
// =============================================================================

/// Bytes downloaded by successful fetches.
pub static FETCH_BYTES: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new("grabber_fetch_bytes_total", "Total bytes fetched").unwrap()
});

/// Fetch stage duration in seconds.
pub static FETCH_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new("grabber_fetch_duration_seconds", "Duration of source fetches")
            .buckets(vec![0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 300.0, 900.0]),
        &["result"], // "success", "failed"
    )
    .unwrap()
});

/// Transcode stage duration in seconds.
pub static TRANSCODE_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "grabber_transcode_duration_seconds",
            "Duration of transcodes",
        )
        .buckets(vec![
            1.0, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0, 600.0, 1800.0,
        ]),
        &["result"], // "success", "failed", "timeout"
    )
    .unwrap()
});

// =============================================================================
// Helper functions
// =============================================================================

/// Get all core metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        // Credentials
        Box::new(CREDENTIAL_RELOADS.clone()),
        // Jobs
        Box::new(JOBS_SUBMITTED.clone()),
        Box::new(JOBS_REJECTED.clone()),
        Box::new(JOBS_FINISHED.clone()),
        Box::new(CLEANUP_FAILURES.clone()),
        // Stages
        Box::new(FETCH_BYTES.clone()),
        Box::new(FETCH_DURATION.clone()),
        Box::new(TRANSCODE_DURATION.clone()),
    ]
}
