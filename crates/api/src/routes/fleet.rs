use axum::routing::{get, post};
use axum::Router;

use crate::handlers::fleet;
use crate::state::AppState;
use crate::ws;

/// Fleet routes mounted at `/worker`.
///
/// `/ws` takes the worker API key; everything else the client API key.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/ws", get(ws::ws_handler))
        .route("/ping", get(fleet::ping_workers))
        .route("/queues", get(fleet::list_queues))
        .route("/list_workers", get(fleet::list_workers))
        .route("/addQueue/{node}", post(fleet::add_queue))
        .route("/removeQueue/{node}", post(fleet::remove_queue))
        .route("/pause/{node}", post(fleet::pause))
        .route("/unpause/{node}", post(fleet::unpause))
        .route("/jobqueue/{node}", get(fleet::node_queues))
}
