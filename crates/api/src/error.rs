use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use warden_core::error::CoreError;
use warden_jobs::JobError;

use crate::fleet::FleetError;

/// Application-level error type for HTTP handlers.
///
/// Wraps the domain errors of the job controller and the fleet manager.
/// Implements [`IntoResponse`] to produce consistent JSON error responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// A domain-level error from `warden_core`.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// A job lifecycle error from the controller.
    #[error(transparent)]
    Job(#[from] JobError),

    /// A fleet operation error.
    #[error(transparent)]
    Fleet(#[from] FleetError),

    /// A bad request with a human-readable message.
    #[error("Bad request: {0}")]
    BadRequest(String),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            // --- CoreError variants ---
            AppError::Core(core) => match core {
                CoreError::NotFound { .. } => (StatusCode::NOT_FOUND, "NOT_FOUND", core.to_string()),
                CoreError::Validation(msg) => {
                    (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone())
                }
                CoreError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg.clone()),
                CoreError::Unauthorized(msg) => {
                    (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", msg.clone())
                }
                CoreError::Forbidden(msg) => (StatusCode::FORBIDDEN, "FORBIDDEN", msg.clone()),
                CoreError::Internal(msg) => internal(msg),
            },

            // --- Job controller ---
            AppError::Job(job) => match job {
                // Fire-and-forget jobs answer with an empty body.
                JobError::JobHasNoResult(_) => return StatusCode::NO_CONTENT.into_response(),
                JobError::NotExistentJob(_) => {
                    (StatusCode::NOT_FOUND, "NOT_FOUND", job.to_string())
                }
                JobError::JobNotFinished(_) => {
                    (StatusCode::CONFLICT, "JOB_NOT_FINISHED", job.to_string())
                }
                JobError::JobFailed(_) => (StatusCode::CONFLICT, "JOB_FAILED", job.to_string()),
                JobError::JobRevoked(_) => (StatusCode::GONE, "JOB_REVOKED", job.to_string()),
                JobError::QueueBackendUnavailable(msg) => {
                    tracing::warn!(error = %msg, "Queue backend unavailable");
                    (
                        StatusCode::SERVICE_UNAVAILABLE,
                        "QUEUE_BACKEND_UNAVAILABLE",
                        "The queue backend is unavailable".to_string(),
                    )
                }
                JobError::Validation(msg) => {
                    (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone())
                }
            },

            // --- Fleet ---
            AppError::Fleet(fleet) => match fleet {
                FleetError::NodeNotFound(_) => {
                    (StatusCode::NOT_FOUND, "NOT_FOUND", fleet.to_string())
                }
                FleetError::NodeTimeout(_) => {
                    (StatusCode::GATEWAY_TIMEOUT, "NODE_TIMEOUT", fleet.to_string())
                }
                FleetError::Validation(msg) => {
                    (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone())
                }
                FleetError::CommandRejected { .. } => {
                    (StatusCode::BAD_REQUEST, "COMMAND_REJECTED", fleet.to_string())
                }
                FleetError::InvalidReply(_) => {
                    tracing::warn!(error = %fleet, "Unexpected node reply");
                    (StatusCode::BAD_GATEWAY, "INVALID_NODE_REPLY", fleet.to_string())
                }
                FleetError::Protocol(e) => internal(&e.to_string()),
            },

            // --- HTTP-specific errors ---
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
        };

        let body = json!({
            "error": message,
            "code": code,
        });

        (status, axum::Json(body)).into_response()
    }
}

fn internal(msg: &str) -> (StatusCode, &'static str, String) {
    tracing::error!(error = %msg, "Internal error");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "INTERNAL_ERROR",
        "An internal error occurred".to_string(),
    )
}
