//! Plugin manifest types and validation.
//!
//! A directory-loaded plugin is described by a JSON manifest, either a
//! standalone `*.json` file or a `plugin.json` inside a sub-directory. The
//! manifest carries the plugin metadata plus how to run its entry point.

use std::path::{Component, Path};

use serde::{Deserialize, Serialize};
use warden_core::naming::is_safe_name;

use crate::plugin::{PluginKind, PluginMetadata};

/// Default wall-clock limit for one script plugin run.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Upper bound accepted for `timeout_secs`.
pub const MAX_TIMEOUT_SECS: u64 = 600;

/// How a script plugin's entry point is started.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Runtime {
    /// `sh <entry>`
    Shell,
    /// `python3 <entry>`
    Python,
    /// `<entry>` executed directly.
    Binary,
}

/// Parsed plugin manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PluginManifest {
    pub name: String,
    pub kind: PluginKind,
    pub version: String,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub inputs: Vec<String>,
    #[serde(default)]
    pub outputs: Vec<String>,
    pub runtime: Runtime,
    /// Entry point, relative to the directory holding the manifest.
    pub entry: String,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl PluginManifest {
    pub fn metadata(&self) -> PluginMetadata {
        PluginMetadata {
            name: self.name.clone(),
            kind: self.kind,
            version: self.version.clone(),
            author: self.author.clone(),
            description: self.description.clone(),
            inputs: self.inputs.clone(),
            outputs: self.outputs.clone(),
        }
    }

    pub fn timeout_secs(&self) -> u64 {
        self.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    #[error("Failed to read manifest: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse manifest: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid manifest: {0}")]
    Invalid(String),
}

/// Validate a manifest against the supported schema.
///
/// Returns the first problem found.
pub fn validate_manifest(manifest: &PluginManifest) -> Result<(), ManifestError> {
    if !is_safe_name(&manifest.name) {
        return Err(ManifestError::Invalid(format!(
            "'{}' is not a valid plugin name",
            manifest.name
        )));
    }

    if manifest.version.trim().is_empty() {
        return Err(ManifestError::Invalid("version must not be empty".into()));
    }

    let entry = Path::new(&manifest.entry);
    if manifest.entry.trim().is_empty() {
        return Err(ManifestError::Invalid("entry must not be empty".into()));
    }
    if entry.is_absolute()
        || entry
            .components()
            .any(|c| matches!(c, Component::ParentDir | Component::Prefix(_)))
    {
        return Err(ManifestError::Invalid(format!(
            "entry '{}' must be a relative path inside the plugin directory",
            manifest.entry
        )));
    }

    if let Some(timeout) = manifest.timeout_secs {
        if timeout == 0 || timeout > MAX_TIMEOUT_SECS {
            return Err(ManifestError::Invalid(format!(
                "timeout_secs must be between 1 and {MAX_TIMEOUT_SECS}"
            )));
        }
    }

    Ok(())
}

/// Read, parse and validate a manifest file.
pub fn read_manifest(path: &Path) -> Result<PluginManifest, ManifestError> {
    let text = std::fs::read_to_string(path)?;
    let manifest: PluginManifest = serde_json::from_str(&text)?;
    validate_manifest(&manifest)?;
    Ok(manifest)
}
