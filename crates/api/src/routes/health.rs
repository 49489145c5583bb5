use axum::extract::State;
use axum::{routing::get, Json, Router};
use serde::Serialize;

use crate::state::AppState;

/// Health check response payload.
#[derive(Serialize)]
pub struct HealthResponse {
    /// Overall service status.
    pub status: &'static str,
    /// Crate version from Cargo.toml.
    pub version: &'static str,
    /// Whether the queue backend answered.
    pub queue_backend_healthy: bool,
    /// Number of connected worker nodes.
    pub nodes: usize,
}

/// GET /health -- unauthenticated service and backend health.
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let queue_backend_healthy = state.controller.queue_overview().await.is_ok();

    let status = if queue_backend_healthy { "ok" } else { "degraded" };

    Json(HealthResponse {
        status,
        version: env!("CARGO_PKG_VERSION"),
        queue_backend_healthy,
        nodes: state.fleet.node_count(),
    })
}

pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
