//! Job API handlers.

use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, StatusCode},
    response::Response,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio_util::io::ReaderStream;
use tracing::warn;
use grabber_core::{JobSnapshot, JobState};

use super::error::ApiError;
use crate::state::AppState;

// ============================================================================
// Request/Response Types
// ============================================================================

/// Request body for submitting a job
#[derive(Debug, Deserialize)]
pub struct SubmitJobBody {
    /// Source media URL
    pub url: String,
    /// Output format name, e.g. `mp3`
    pub format: String,
}

/// Response for an accepted job
#[derive(Debug, Serialize)]
pub struct SubmitJobResponse {
    pub job_id: String,
    pub state: JobState,
    pub created_at: String,
}

/// Response for listing jobs
#[derive(Debug, Serialize)]
pub struct ListJobsResponse {
    pub jobs: Vec<JobSnapshot>,
    pub total: usize,
}

// ============================================================================
// Handlers
// ============================================================================

/// Submit a new job
pub async fn submit_job(
    State(state): State<Arc<AppState>>,
    Json(body): Json<SubmitJobBody>,
) -> Result<(StatusCode, Json<SubmitJobResponse>), ApiError> {
    let job = state.pipeline().submit(&body.url, &body.format).await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(SubmitJobResponse {
            job_id: job.id,
            state: job.state,
            created_at: job.created_at.to_rfc3339(),
        }),
    ))
}

/// List all known jobs, newest first
pub async fn list_jobs(State(state): State<Arc<AppState>>) -> Json<ListJobsResponse> {
    let jobs = state.pipeline().list().await;
    Json(ListJobsResponse {
        total: jobs.len(),
        jobs,
    })
}

/// Get a job by ID
pub async fn get_job(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<JobSnapshot>, ApiError> {
    Ok(Json(state.pipeline().status(&id).await?))
}

/// Cancel a job (DELETE endpoint)
pub async fn cancel_job(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<JobSnapshot>, ApiError> {
    Ok(Json(state.pipeline().cancel(&id).await?))
}

/// Stream the delivered artifact of a finished job
pub async fn get_result(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let artifact = state.pipeline().result(&id).await?;

    let file = tokio::fs::File::open(&artifact.path).await.map_err(|e| {
        warn!(job_id = %id, path = %artifact.path.display(), error = %e, "Artifact unreadable");
        ApiError::not_found(format!("Artifact for job {} is no longer available", id))
    })?;

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, artifact.format.mime_type())
        .header(header::CONTENT_LENGTH, artifact.size_bytes)
        .header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", artifact.file_name),
        )
        .body(Body::from_stream(ReaderStream::new(file)))
        .map_err(|e| ApiError::internal(e.to_string()))
}
