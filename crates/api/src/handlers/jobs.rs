//! Handlers for job submission and lifecycle queries.
//!
//! Thin wrappers over [`JobController`](warden_jobs::JobController): parse,
//! call, wrap in `{ "data": ... }`. Status mapping lives in
//! [`AppError`](crate::error::AppError).

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;
use serde_json::Value;
use warden_core::job::{JobStatus, JobType};
use warden_core::types::JobId;

use crate::error::{AppError, AppResult};
use crate::middleware::auth::RequireApiKey;
use crate::response::DataResponse;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct CreatedJob {
    pub job_id: JobId,
    pub queue: &'static str,
}

#[derive(Debug, Serialize)]
pub struct JobStatusView {
    pub job_id: JobId,
    pub status: JobStatus,
}

#[derive(Debug, Serialize)]
pub struct JobResultView {
    pub job_id: JobId,
    pub result: Value,
}

#[derive(Debug, Serialize)]
pub struct CancelView {
    pub job_id: JobId,
    /// Whether the job was still queued or running when revoked.
    pub canceled: bool,
}

// ---------------------------------------------------------------------------
// POST /job/{type}
// ---------------------------------------------------------------------------

/// Enqueue a job of `{type}` with the request body as payload.
pub async fn create_job(
    _: RequireApiKey,
    State(state): State<AppState>,
    Path(job_type): Path<String>,
    Json(payload): Json<Value>,
) -> AppResult<impl IntoResponse> {
    let job_type: JobType = job_type.parse()?;
    if !payload.is_object() {
        return Err(AppError::BadRequest("Job payload must be a JSON object".into()));
    }
    let job_id = state.controller.submit(job_type, payload).await?;

    Ok((
        StatusCode::CREATED,
        Json(DataResponse {
            data: CreatedJob {
                job_id,
                queue: job_type.queue_name(),
            },
        }),
    ))
}

// ---------------------------------------------------------------------------
// GET /job/{id}/status
// ---------------------------------------------------------------------------

pub async fn get_status(
    _: RequireApiKey,
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> AppResult<Json<DataResponse<JobStatusView>>> {
    let status = state.controller.get_status(&job_id).await?;
    Ok(Json(DataResponse {
        data: JobStatusView { job_id, status },
    }))
}

// ---------------------------------------------------------------------------
// GET /job/{id}/result
// ---------------------------------------------------------------------------

/// The result of a successful job. Fire-and-forget jobs answer 204.
pub async fn get_result(
    _: RequireApiKey,
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> AppResult<Json<DataResponse<JobResultView>>> {
    let result = state.controller.get_result(&job_id).await?;
    Ok(Json(DataResponse {
        data: JobResultView { job_id, result },
    }))
}

// ---------------------------------------------------------------------------
// DELETE /job/{id}/cancel
// ---------------------------------------------------------------------------

pub async fn cancel_job(
    _: RequireApiKey,
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> AppResult<Json<DataResponse<CancelView>>> {
    let canceled = state.controller.cancel_job(&job_id).await?;
    Ok(Json(DataResponse {
        data: CancelView { job_id, canceled },
    }))
}
