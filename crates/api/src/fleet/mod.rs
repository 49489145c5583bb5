//! Master control endpoint.
//!
//! One [`FleetManager`] serves every connected node over a single shared
//! `ConnectionManager`, keyed by the node id assigned at connect.

mod error;
mod manager;

pub use error::FleetError;
pub use manager::{FleetManager, NodeInfo, NodeSession, PING_TIMEOUT};
