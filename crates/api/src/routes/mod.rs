pub mod fleet;
pub mod health;
pub mod jobs;

use axum::Router;

use crate::state::AppState;

/// Build the master's route tree.
///
/// ```text
/// POST   /job/{type}                 create_job
/// GET    /job/{id}/status            get_status
/// GET    /job/{id}/result            get_result
/// DELETE /job/{id}/cancel            cancel_job
///
/// GET    /worker/ws                  node control connection (worker key)
/// GET    /worker/ping                ping_workers
/// GET    /worker/queues              list_queues
/// GET    /worker/list_workers        list_workers
/// POST   /worker/addQueue/{node}     add_queue
/// POST   /worker/removeQueue/{node}  remove_queue
/// POST   /worker/pause/{node}        pause
/// POST   /worker/unpause/{node}      unpause
/// GET    /worker/jobqueue/{node}     node_queues
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/job", jobs::router())
        .nest("/worker", fleet::router())
}
