//! `warden-api` library crate.
//!
//! The master: job routes over the [`JobController`](warden_jobs::JobController)
//! and the fleet control endpoint. The binary entrypoint lives in `main.rs`.

pub mod config;
pub mod error;
pub mod fleet;
pub mod handlers;
pub mod middleware;
pub mod response;
pub mod router;
pub mod routes;
pub mod state;
pub mod ws;
