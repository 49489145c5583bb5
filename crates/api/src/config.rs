use std::time::Duration;

use warden_core::config::{env_optional, env_parse, env_required, ConfigError};

/// Default reply timeout for fleet commands.
///
/// A `remove_queue` or `pause` reply only comes back after the node has
/// stopped its workers, which can take a full stop grace plus the kill.
pub const DEFAULT_FLEET_COMMAND_TIMEOUT: Duration = Duration::from_secs(30);

/// Master server configuration loaded from environment variables.
///
/// | Env Var                | Default                 |
/// |------------------------|-------------------------|
/// | `HOST`                 | `0.0.0.0`               |
/// | `PORT`                 | `3000`                  |
/// | `API_KEY`              | required                |
/// | `WORKER_API_KEY`       | required                |
/// | `QUEUE_BACKEND_URL`    | unset: in-memory queues |
/// | `REQUEST_TIMEOUT_SECS` | `30`                    |
/// | `COMMAND_TIMEOUT_SECS` | `30`                    |
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Bearer token for the job and fleet HTTP routes.
    pub api_key: String,
    /// Bearer token nodes present on `/worker/ws`.
    pub worker_api_key: String,
    /// PostgreSQL URL. `None` selects the in-memory backend.
    pub queue_backend_url: Option<String>,
    pub request_timeout_secs: u64,
    /// Reply timeout for fleet commands sent to nodes.
    pub command_timeout: Duration,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let host = env_optional("HOST").unwrap_or_else(|| "0.0.0.0".into());
        let port = env_parse("PORT", 3000u16)?;
        let api_key = env_required("API_KEY")?;
        let worker_api_key = env_required("WORKER_API_KEY")?;
        let queue_backend_url = env_optional("QUEUE_BACKEND_URL");
        let request_timeout_secs = env_parse("REQUEST_TIMEOUT_SECS", 30u64)?;
        let command_timeout_secs =
            env_parse("COMMAND_TIMEOUT_SECS", DEFAULT_FLEET_COMMAND_TIMEOUT.as_secs())?;

        Ok(Self {
            host,
            port,
            api_key,
            worker_api_key,
            queue_backend_url,
            request_timeout_secs,
            command_timeout: Duration::from_secs(command_timeout_secs.max(1)),
        })
    }
}
