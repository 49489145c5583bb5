//! The plugin capability interface.
//!
//! A plugin is constructed with its input by a [`PluginFactory`] and then
//! run once. Factories are what the registry stores.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::PluginError;

/// Which extension point a plugin serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PluginKind {
    Correlation,
    Enrichment,
}

/// Declared metadata of a plugin implementation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginMetadata {
    pub name: String,
    pub kind: PluginKind,
    pub version: String,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    /// Names of the input fields the plugin consumes.
    #[serde(default)]
    pub inputs: Vec<String>,
    /// Names of the output fields the plugin produces.
    #[serde(default)]
    pub outputs: Vec<String>,
}

/// A constructed plugin instance, ready to run.
#[async_trait]
pub trait Plugin: Send {
    async fn run(&mut self) -> Result<Value, PluginError>;
}

// Lets tests format `Result<Box<dyn Plugin>, _>` in assertion failures.
#[cfg(test)]
impl std::fmt::Debug for dyn Plugin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("<dyn Plugin>")
    }
}

/// Constructor for one plugin implementation.
pub trait PluginFactory: Send + Sync + 'static {
    fn metadata(&self) -> PluginMetadata;

    /// Distinguishes instances of the same factory type.
    ///
    /// Together with the factory's type this is the implementation
    /// identity the registry compares on re-registration. Factories with a
    /// single implementation per type keep the empty default.
    fn discriminator(&self) -> String {
        String::new()
    }

    /// Build a plugin instance from construction arguments.
    fn create(&self, args: Value) -> Result<Box<dyn Plugin>, PluginError>;
}

/// Deserialize construction arguments into a plugin's input type.
///
/// Shape mismatches surface as [`PluginError::NotAValidPlugin`].
pub fn parse_input<T: DeserializeOwned>(plugin: &str, args: Value) -> Result<T, PluginError> {
    serde_json::from_value(args).map_err(|e| PluginError::NotAValidPlugin {
        name: plugin.to_string(),
        reason: e.to_string(),
    })
}
