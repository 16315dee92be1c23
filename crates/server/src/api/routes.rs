use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use super::middleware::{metrics_middleware, rate_limit_middleware, timing_middleware};
use super::{handlers, jobs};
use crate::state::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        // Health, config and observability
        .route("/health", get(handlers::health))
        .route("/config", get(handlers::get_config))
        .route("/stats", get(handlers::get_stats))
        .route("/metrics", get(handlers::get_metrics))
        // Credentials
        .route("/credentials/reload", post(handlers::reload_credentials))
        // Jobs
        .route("/jobs", post(jobs::submit_job).get(jobs::list_jobs))
        .route("/jobs/{id}", get(jobs::get_job).delete(jobs::cancel_job))
        .route("/jobs/{id}/result", get(jobs::get_result))
        // Innermost first: rejected requests still get timing headers and metrics
        .layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit_middleware,
        ))
        .layer(middleware::from_fn(timing_middleware))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
