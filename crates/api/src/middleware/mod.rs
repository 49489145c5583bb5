//! Authentication extractors.
//!
//! - [`auth::RequireApiKey`] -- the client API key, for job and fleet routes.
//! - [`auth::RequireWorkerKey`] -- the worker API key, for `/worker/ws`.

pub mod auth;
