//! Startup plugin check.
//!
//! The agent never runs plugins itself. Every `warden-worker` subprocess
//! builds its own registry from `PLUGIN_DIRS`. The agent loads the same
//! directories once at boot so broken manifests are reported in the node
//! log before a job reaches them, then hands those directories to its
//! workers through [`worker_env`] so both sides load the same set.

use std::path::PathBuf;

use warden_plugins::builtin::register_builtins;
use warden_plugins::loader::{load_dirs, LoadFailure};
use warden_plugins::{PluginError, PluginRegistry};

/// Environment variable the worker reads its plugin directories from.
pub const PLUGIN_DIRS_VAR: &str = "PLUGIN_DIRS";

/// Outcome of [`check_plugin_dirs`].
#[derive(Debug, Default)]
pub struct PluginCheck {
    /// Every plugin a worker will find, built-ins included, sorted.
    pub available: Vec<String>,
    pub failed: Vec<LoadFailure>,
}

/// Load the built-ins and `dirs` into a scratch registry.
///
/// Fails only if the built-ins themselves cannot be registered.
pub fn check_plugin_dirs(dirs: &[PathBuf]) -> Result<PluginCheck, PluginError> {
    let registry = PluginRegistry::new();
    register_builtins(&registry)?;
    let report = load_dirs(&registry, dirs);

    Ok(PluginCheck {
        available: registry.list_all().into_iter().map(|m| m.name).collect(),
        failed: report.failed,
    })
}

/// Environment for worker subprocesses so they load exactly `dirs`.
pub fn worker_env(dirs: &[PathBuf]) -> Vec<(String, String)> {
    let joined = dirs
        .iter()
        .map(|dir| dir.display().to_string())
        .collect::<Vec<_>>()
        .join(",");
    vec![(PLUGIN_DIRS_VAR.to_string(), joined)]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn broken_manifest_is_reported_and_builtins_stay_available() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("broken.json"), "{ not json").unwrap();

        let check = check_plugin_dirs(&[dir.path().to_path_buf()]).unwrap();
        assert_eq!(check.failed.len(), 1);
        assert!(check.failed[0].path.ends_with("broken.json"));
        assert!(check.available.contains(&"ip_info".to_string()));
    }

    #[test]
    fn missing_directory_is_a_failure_not_an_error() {
        let check = check_plugin_dirs(&[PathBuf::from("/nonexistent/warden-plugins")]).unwrap();
        assert_eq!(check.failed.len(), 1);
    }

    #[test]
    fn worker_env_joins_directories() {
        let env = worker_env(&[PathBuf::from("/opt/a"), PathBuf::from("/opt/b")]);
        assert_eq!(env, vec![("PLUGIN_DIRS".to_string(), "/opt/a,/opt/b".to_string())]);
    }
}
