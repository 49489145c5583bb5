//! Node control connections.
//!
//! Provides the HTTP upgrade handler for `/worker/ws` and the per-node
//! socket loop feeding the [`FleetManager`](crate::fleet::FleetManager).

mod handler;

pub use handler::{ws_handler, HEARTBEAT_INTERVAL, WORKER_NAME_HEADER};
