//! Shared domain types for the Warden job-execution fleet.
//!
//! This crate has zero internal dependencies so it can be used by the
//! master, the node agent, the per-queue workers and every backend.

pub mod backend;
pub mod config;
pub mod correlation;
pub mod error;
pub mod job;
pub mod naming;
pub mod queue;
pub mod types;
