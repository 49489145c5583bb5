//! `warden-worker` library crate.
//!
//! Re-exports the consumer pieces for integration testing. The binary
//! entrypoint lives in `main.rs`.

pub mod config;
pub mod consumer;
pub mod runner;
pub mod webhook;
