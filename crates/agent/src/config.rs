use std::collections::BTreeSet;
use std::path::PathBuf;
use std::time::Duration;

pub use warden_core::config::ConfigError;
use warden_core::config::{env_flag, env_optional, env_parse, env_required, split_list};
use warden_core::queue::{parse_queue_set, ALL_QUEUES_KEYWORD};
use warden_protocol::reconnect::ReconnectConfig;

/// Default worker binary name, looked up beside the agent executable.
const WORKER_BIN_NAME: &str = "warden-worker";

/// Default time a worker gets between SIGTERM and SIGKILL.
pub const DEFAULT_STOP_GRACE: Duration = Duration::from_secs(10);

/// Node agent configuration loaded from environment variables.
///
/// | Env Var                    | Default                             |
/// |----------------------------|-------------------------------------|
/// | `WORKER_CONTROL_URL`       | required                            |
/// | `WORKER_API_KEY`           | required                            |
/// | `WORKER_NAME`              | `$HOSTNAME`, else `node`            |
/// | `PLUGIN_DIRS`              | none                                |
/// | `WORKER_QUEUES`            | `ALL`                               |
/// | `WORKER_REMOTE_CONTROL`    | `false`                             |
/// | `WORKER_BIN`               | `warden-worker` beside this binary  |
/// | `WORKER_STOP_GRACE_SECS`   | `10`                                |
/// | `RECONNECT_DELAY_SECS`     | `5`                                 |
/// | `RECONNECT_MAX_DELAY_SECS` | same as `RECONNECT_DELAY_SECS`      |
#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub control_url: String,
    pub api_key: String,
    pub worker_name: String,
    pub plugin_dirs: Vec<PathBuf>,
    /// Queues started at boot and restored by `reset_queues`.
    pub desired_queues: BTreeSet<String>,
    /// When set, no queue is started at boot and the master decides.
    pub remote_control: bool,
    pub worker_bin: PathBuf,
    pub stop_grace: Duration,
    pub reconnect: ReconnectConfig,
}

impl AgentConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let control_url = env_required("WORKER_CONTROL_URL")?;
        let api_key = env_required("WORKER_API_KEY")?;
        let worker_name = env_optional("WORKER_NAME")
            .or_else(|| env_optional("HOSTNAME"))
            .unwrap_or_else(|| "node".to_string());

        let plugin_dirs = env_optional("PLUGIN_DIRS")
            .map(|raw| split_list(&raw).into_iter().map(PathBuf::from).collect())
            .unwrap_or_default();

        let queues_raw =
            env_optional("WORKER_QUEUES").unwrap_or_else(|| ALL_QUEUES_KEYWORD.to_string());
        let desired_queues = parse_queue_set(&queues_raw).map_err(|_| ConfigError::Invalid {
            key: "WORKER_QUEUES",
            value: queues_raw.clone(),
        })?;

        let remote_control = env_flag("WORKER_REMOTE_CONTROL", false)?;
        let worker_bin = env_optional("WORKER_BIN")
            .map(PathBuf::from)
            .unwrap_or_else(default_worker_bin);

        let stop_grace_secs: u64 =
            env_parse("WORKER_STOP_GRACE_SECS", DEFAULT_STOP_GRACE.as_secs())?;
        let reconnect_secs: u64 = env_parse("RECONNECT_DELAY_SECS", 5)?;
        let reconnect_max_secs: u64 = env_parse("RECONNECT_MAX_DELAY_SECS", reconnect_secs)?;

        Ok(Self {
            control_url,
            api_key,
            worker_name,
            plugin_dirs,
            desired_queues,
            remote_control,
            worker_bin,
            stop_grace: Duration::from_secs(stop_grace_secs),
            reconnect: reconnect_config(reconnect_secs, reconnect_max_secs),
        })
    }
}

/// Fixed delay unless a larger cap is configured, then doubling.
fn reconnect_config(delay_secs: u64, max_secs: u64) -> ReconnectConfig {
    let delay = Duration::from_secs(delay_secs.max(1));
    ReconnectConfig::capped(delay, Duration::from_secs(max_secs))
}

fn default_worker_bin() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join(WORKER_BIN_NAME)))
        .unwrap_or_else(|| PathBuf::from(WORKER_BIN_NAME))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reconnect_is_fixed_by_default() {
        let config = reconnect_config(5, 5);
        assert!(config.is_fixed());
        assert_eq!(config, ReconnectConfig::default());
    }

    #[test]
    fn larger_cap_enables_backoff() {
        let config = reconnect_config(1, 30);
        assert!(!config.is_fixed());
        assert_eq!(config.next(Duration::from_secs(1)), Duration::from_secs(2));
        assert_eq!(config.cap, Duration::from_secs(30));
    }

    #[test]
    fn zero_delay_is_raised_to_one_second() {
        assert_eq!(reconnect_config(0, 0).base, Duration::from_secs(1));
    }

    #[test]
    fn default_worker_bin_is_named_warden_worker() {
        assert!(default_worker_bin().ends_with(WORKER_BIN_NAME));
    }
}
