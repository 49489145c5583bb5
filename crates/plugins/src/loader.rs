//! Directory-scan plugin loading.
//!
//! Every candidate unit in a plugin directory is imported on its own and
//! asked to register itself. A unit is either a standalone `*.json`
//! manifest or a sub-directory whose entry unit is `plugin.json`. A broken
//! unit is logged, recorded in the [`LoadReport`] and skipped. Loading
//! never fails as a whole.

use std::path::{Path, PathBuf};

use crate::error::PluginError;
use crate::manifest::{read_manifest, ManifestError};
use crate::registry::{PluginRegistry, RegisterOutcome};
use crate::script::ScriptPluginFactory;

/// Entry unit of a sub-directory plugin.
pub const MANIFEST_FILE: &str = "plugin.json";

/// One unit that could not be loaded.
#[derive(Debug, Clone)]
pub struct LoadFailure {
    pub path: PathBuf,
    pub error: String,
}

/// Summary of a load pass.
#[derive(Debug, Clone, Default)]
pub struct LoadReport {
    /// Names newly registered.
    pub loaded: Vec<String>,
    /// Names whose identical implementation was already registered.
    pub unchanged: Vec<String>,
    pub failed: Vec<LoadFailure>,
}

impl LoadReport {
    pub fn merge(&mut self, other: LoadReport) {
        self.loaded.extend(other.loaded);
        self.unchanged.extend(other.unchanged);
        self.failed.extend(other.failed);
    }

    fn fail(&mut self, path: &Path, error: impl ToString) {
        let error = error.to_string();
        tracing::warn!(path = %path.display(), error = %error, "Skipping plugin unit");
        self.failed.push(LoadFailure {
            path: path.to_path_buf(),
            error,
        });
    }
}

/// An imported, not yet registered, plugin unit.
pub struct PluginUnit {
    factory: ScriptPluginFactory,
}

impl PluginUnit {
    /// Read and validate the unit's manifest.
    pub fn import(manifest_path: &Path) -> Result<Self, ManifestError> {
        let manifest = read_manifest(manifest_path)?;
        Ok(Self {
            factory: ScriptPluginFactory::new(manifest, manifest_path),
        })
    }

    pub fn name(&self) -> &str {
        &self.factory.manifest().name
    }

    /// The unit's registration entry point.
    pub fn register(self, registry: &PluginRegistry) -> Result<RegisterOutcome, PluginError> {
        registry.register(self.factory)
    }
}

/// Candidate manifest paths in `dir`, sorted by file name.
fn candidate_units(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut entries: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .collect();
    entries.sort();

    Ok(entries
        .into_iter()
        .filter_map(|path| {
            if path.is_dir() {
                let manifest = path.join(MANIFEST_FILE);
                manifest.is_file().then_some(manifest)
            } else if path.extension().is_some_and(|ext| ext == "json") {
                Some(path)
            } else {
                None
            }
        })
        .collect())
}

/// Load every plugin unit in `dir` into `registry`.
pub fn load_dir(registry: &PluginRegistry, dir: &Path) -> LoadReport {
    let mut report = LoadReport::default();

    let units = match candidate_units(dir) {
        Ok(units) => units,
        Err(e) => {
            report.fail(dir, format!("cannot read plugin directory: {e}"));
            return report;
        }
    };

    for manifest_path in units {
        let unit = match PluginUnit::import(&manifest_path) {
            Ok(unit) => unit,
            Err(e) => {
                report.fail(&manifest_path, e);
                continue;
            }
        };

        let name = unit.name().to_string();
        match unit.register(registry) {
            Ok(RegisterOutcome::Registered) => report.loaded.push(name),
            Ok(RegisterOutcome::AlreadyRegistered) => report.unchanged.push(name),
            Err(e) => report.fail(&manifest_path, e),
        }
    }

    tracing::info!(
        dir = %dir.display(),
        loaded = report.loaded.len(),
        failed = report.failed.len(),
        "Plugin directory loaded",
    );
    report
}

/// Load several directories in order.
pub fn load_dirs(registry: &PluginRegistry, dirs: &[PathBuf]) -> LoadReport {
    let mut report = LoadReport::default();
    for dir in dirs {
        report.merge(load_dir(registry, dir));
    }
    report
}
