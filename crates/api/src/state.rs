use std::sync::Arc;

use warden_jobs::JobController;

use crate::config::ServerConfig;
use crate::fleet::FleetManager;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheap to clone: the controller wraps an `Arc` and the rest sit behind one.
#[derive(Clone)]
pub struct AppState {
    /// Job lifecycle façade over the configured queue backend.
    pub controller: JobController,
    /// Connected worker nodes and the control connections to them.
    pub fleet: Arc<FleetManager>,
    pub config: Arc<ServerConfig>,
}
