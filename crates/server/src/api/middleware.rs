//! Rate limiting, timing and metrics middleware for API routes.

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{HeaderValue, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tracing::warn;

use super::rate_limit::client_ip;
use crate::metrics::{
    normalize_path, HTTP_REQUESTS_IN_FLIGHT, HTTP_REQUESTS_TOTAL, HTTP_REQUEST_DURATION,
    RATE_LIMITED_TOTAL,
};
use crate::state::AppState;

/// Paths never subject to rate limiting.
const RATE_LIMIT_EXEMPT: &[&str] = &["/health", "/metrics"];

const API_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Metrics middleware that tracks HTTP request duration and counts.
///
/// This middleware records:
/// - Request duration (histogram)
/// - Request count (counter)
/// - Requests in flight (gauge)
pub async fn metrics_middleware(request: Request<Body>, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().to_string();
    let path = normalize_path(request.uri().path());

    HTTP_REQUESTS_IN_FLIGHT.inc();

    let response = next.run(request).await;

    HTTP_REQUESTS_IN_FLIGHT.dec();

    let duration = start.elapsed().as_secs_f64();
    let status = response.status().as_u16().to_string();

    HTTP_REQUEST_DURATION
        .with_label_values(&[&method, &path, &status])
        .observe(duration);
    HTTP_REQUESTS_TOTAL
        .with_label_values(&[&method, &path, &status])
        .inc();

    response
}

/// Adds `X-Process-Time` (seconds) and `X-API-Version` to every response.
pub async fn timing_middleware(request: Request<Body>, next: Next) -> Response {
    let start = Instant::now();
    let mut response = next.run(request).await;

    let elapsed = format!("{:.6}", start.elapsed().as_secs_f64());
    let headers = response.headers_mut();
    if let Ok(value) = HeaderValue::from_str(&elapsed) {
        headers.insert("x-process-time", value);
    }
    headers.insert("x-api-version", HeaderValue::from_static(API_VERSION));

    response
}

/// Body of a 429 response.
#[derive(Debug, Serialize)]
pub struct RateLimitedResponse {
    pub error: String,
    /// Seconds until the client may retry.
    pub retry_after: u64,
}

/// Per-client rate limiting.
///
/// Requests over the per-minute or per-hour rate get a 429 with a
/// `Retry-After` header.
pub async fn rate_limit_middleware(
    State(state): State<Arc<AppState>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let Some(limiter) = state.rate_limiter() else {
        return next.run(request).await;
    };
    if RATE_LIMIT_EXEMPT.contains(&request.uri().path()) {
        return next.run(request).await;
    }

    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip());
    let client = client_ip(request.headers(), peer);

    match limiter.check(client).await {
        Ok(()) => next.run(request).await,
        Err(limited) => {
            RATE_LIMITED_TOTAL.inc();
            let retry_after = limited.wait.as_secs_f64().ceil().max(1.0) as u64;
            warn!(
                client = %client,
                path = %request.uri().path(),
                window = %limited.window,
                retry_after,
                "Rate limit exceeded"
            );

            (
                StatusCode::TOO_MANY_REQUESTS,
                [("retry-after", retry_after.to_string())],
                Json(RateLimitedResponse {
                    error: format!(
                        "Rate limit exceeded ({} requests per {})",
                        limited.limit, limited.window
                    ),
                    retry_after,
                }),
            )
                .into_response()
        }
    }
}
