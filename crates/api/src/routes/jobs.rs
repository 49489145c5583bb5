use axum::routing::{delete, get, post};
use axum::Router;

use crate::handlers::jobs;
use crate::state::AppState;

/// Job routes mounted at `/job`. All require the client API key.
///
/// The first segment shares one parameter name: it is the job type on
/// POST and the job id everywhere else.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/{job}", post(jobs::create_job))
        .route("/{job}/status", get(jobs::get_status))
        .route("/{job}/result", get(jobs::get_result))
        .route("/{job}/cancel", delete(jobs::cancel_job))
}
