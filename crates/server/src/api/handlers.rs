use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;
use grabber_core::{PipelineStatus, SanitizedConfig};

use super::error::ApiError;
use crate::metrics::{collect_dynamic_metrics, encode_metrics};
use crate::state::AppState;

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// How long a media engine check answers `/health` before it is re-run.
pub const ENGINE_CHECK_MAX_AGE: Duration = Duration::from_secs(5);

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// `ok` or `degraded`.
    pub status: String,
    pub version: String,
    pub checks: HealthChecks,
}

#[derive(Debug, Serialize)]
pub struct HealthChecks {
    pub credential: CheckResult,
    pub media_engine: CheckResult,
}

#[derive(Debug, Serialize)]
pub struct CheckResult {
    pub ok: bool,
    pub detail: String,
}

/// Liveness plus dependency checks.
///
/// Re-reads the cookie file without replacing the cached credential and
/// checks the media engine binary, at most once per [`ENGINE_CHECK_MAX_AGE`].
/// Any failing check yields 503.
pub async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let (credential, engine) = tokio::join!(
        state.credentials().check(),
        state.transcoder().check_available_cached(ENGINE_CHECK_MAX_AGE)
    );

    let credential = match credential {
        Ok(count) => CheckResult {
            ok: true,
            detail: format!("{} cookies loadable", count),
        },
        Err(e) => CheckResult {
            ok: false,
            detail: e.to_string(),
        },
    };
    let media_engine = match engine {
        Ok(()) => CheckResult {
            ok: true,
            detail: format!("{} reachable", state.transcoder().engine_name()),
        },
        Err(detail) => CheckResult { ok: false, detail },
    };

    let healthy = credential.ok && media_engine.ok;
    if !healthy {
        warn!(
            credential = %credential.detail,
            media_engine = %media_engine.detail,
            "Health check degraded"
        );
    }

    let status = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(HealthResponse {
            status: if healthy { "ok" } else { "degraded" }.to_string(),
            version: VERSION.to_string(),
            checks: HealthChecks {
                credential,
                media_engine,
            },
        }),
    )
}

pub async fn get_config(State(state): State<Arc<AppState>>) -> Json<SanitizedConfig> {
    Json(state.sanitized_config())
}

/// Pipeline pool status and job counts.
pub async fn get_stats(State(state): State<Arc<AppState>>) -> Json<PipelineStatus> {
    Json(state.pipeline().status_summary().await)
}

#[derive(Debug, Serialize)]
pub struct ReloadResponse {
    pub version: u64,
    pub cookies: usize,
    pub loaded_at: String,
}

/// Re-reads the cookie file. The previous credential stays active on failure.
pub async fn reload_credentials(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ReloadResponse>, ApiError> {
    let credential = state
        .credentials()
        .reload()
        .await
        .map_err(|e| ApiError::new(StatusCode::SERVICE_UNAVAILABLE, e.to_string()))?;

    Ok(Json(ReloadResponse {
        version: credential.version,
        cookies: credential.len(),
        loaded_at: credential.loaded_at.to_rfc3339(),
    }))
}

/// Prometheus text exposition.
pub async fn get_metrics(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, ApiError> {
    collect_dynamic_metrics(&state).await;
    let body = encode_metrics().map_err(|e| ApiError::internal(e.to_string()))?;

    Ok((
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        body,
    ))
}
