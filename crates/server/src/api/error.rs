//! JSON error responses.

use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use grabber_core::PipelineError;

/// Seconds a client should wait before resubmitting to a saturated pipeline.
pub const SATURATED_RETRY_AFTER_SECS: u64 = 5;

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// An error returned from a handler, rendered as `{"error": "..."}`.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
    pub retry_after_secs: Option<u64>,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            retry_after_secs: None,
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    pub fn with_retry_after(mut self, secs: u64) -> Self {
        self.retry_after_secs = Some(secs);
        self
    }
}

impl From<PipelineError> for ApiError {
    fn from(e: PipelineError) -> Self {
        let status = match &e {
            PipelineError::Saturated { .. } => {
                return Self::new(StatusCode::SERVICE_UNAVAILABLE, e.to_string())
                    .with_retry_after(SATURATED_RETRY_AFTER_SECS);
            }
            PipelineError::NotReady { .. } => StatusCode::CONFLICT,
            PipelineError::NotFound(_) => StatusCode::NOT_FOUND,
            PipelineError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            PipelineError::NotRunning => StatusCode::SERVICE_UNAVAILABLE,
            PipelineError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self::new(status, e.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorResponse {
            error: self.message,
        });
        match self.retry_after_secs {
            Some(secs) => (
                self.status,
                [(header::RETRY_AFTER, secs.to_string())],
                body,
            )
                .into_response(),
            None => (self.status, body).into_response(),
        }
    }
}
