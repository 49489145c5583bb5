//! Plugin registry and directory loader.
//!
//! Correlation and enrichment behavior is added by registering a
//! [`PluginFactory`] in a [`PluginRegistry`]: either at process start from
//! [`builtin::register_builtins`], or by scanning a directory of plugin
//! manifests with [`loader::load_dir`]. Jobs then look plugins up by name
//! and never need to know where they came from.

pub mod builtin;
pub mod error;
pub mod loader;
pub mod manifest;
pub mod plugin;
pub mod registry;
pub mod script;

pub use error::PluginError;
pub use plugin::{Plugin, PluginFactory, PluginKind, PluginMetadata};
pub use registry::{PluginRegistry, RegisterOutcome};
