//! Static bearer-token authentication for Axum handlers.
//!
//! A missing or malformed `Authorization` header is rejected with 401, a
//! token that does not match the configured key with 403.

use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use warden_core::error::CoreError;

use crate::error::AppError;
use crate::state::AppState;

/// Caller presented the client `API_KEY`.
///
/// ```ignore
/// async fn my_handler(_: RequireApiKey, State(state): State<AppState>) -> AppResult<Json<()>> {
///     Ok(Json(()))
/// }
/// ```
#[derive(Debug, Clone, Copy)]
pub struct RequireApiKey;

/// Caller presented the `WORKER_API_KEY`. Used by the node upgrade route.
#[derive(Debug, Clone, Copy)]
pub struct RequireWorkerKey;

impl FromRequestParts<AppState> for RequireApiKey {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        check_bearer(parts, &state.config.api_key)?;
        Ok(RequireApiKey)
    }
}

impl FromRequestParts<AppState> for RequireWorkerKey {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        check_bearer(parts, &state.config.worker_api_key)?;
        Ok(RequireWorkerKey)
    }
}

/// Compare the request's bearer token with `expected`.
fn check_bearer(parts: &Parts, expected: &str) -> Result<(), AppError> {
    let auth_header = parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| {
            AppError::Core(CoreError::Unauthorized(
                "Missing Authorization header".into(),
            ))
        })?;

    let token = auth_header.strip_prefix("Bearer ").ok_or_else(|| {
        AppError::Core(CoreError::Unauthorized(
            "Invalid Authorization format. Expected: Bearer <token>".into(),
        ))
    })?;

    if token != expected {
        return Err(AppError::Core(CoreError::Forbidden("Invalid API key".into())));
    }
    Ok(())
}
