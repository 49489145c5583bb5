use std::path::PathBuf;
use std::time::Duration;

use warden_core::config::{env_parse, env_optional, env_required, split_list, ConfigError};
use warden_core::correlation::DEFAULT_CORRELATION_THRESHOLD;

/// Per-queue worker configuration loaded from environment variables.
///
/// | Env Var                 | Default  |
/// |-------------------------|----------|
/// | `QUEUE_BACKEND_URL`     | required |
/// | `PLUGIN_DIRS`           | none     |
/// | `CORRELATION_THRESHOLD` | `20`     |
/// | `POLL_INTERVAL_MS`      | `1000`   |
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub queue_backend_url: String,
    pub plugin_dirs: Vec<PathBuf>,
    pub correlation_threshold: u64,
    pub poll_interval: Duration,
}

impl WorkerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let queue_backend_url = env_required("QUEUE_BACKEND_URL")?;
        let plugin_dirs = env_optional("PLUGIN_DIRS")
            .map(|raw| split_list(&raw).into_iter().map(PathBuf::from).collect())
            .unwrap_or_default();
        let correlation_threshold =
            env_parse("CORRELATION_THRESHOLD", DEFAULT_CORRELATION_THRESHOLD)?;
        let poll_interval_ms: u64 = env_parse("POLL_INTERVAL_MS", 1000)?;

        Ok(Self {
            queue_backend_url,
            plugin_dirs,
            correlation_threshold,
            poll_interval: Duration::from_millis(poll_interval_ms.max(1)),
        })
    }
}
