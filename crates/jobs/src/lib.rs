//! Job Controller and process-local backends.

pub mod controller;
pub mod error;
pub mod memory;

pub use controller::JobController;
pub use error::JobError;
pub use memory::{InMemoryAttributeStore, InMemoryBackend};
