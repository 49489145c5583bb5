//! Process supervisor: one worker subprocess per live queue.
//!
//! The table lives behind a `std::sync::Mutex` that is only held for
//! synchronous bookkeeping. Children are taken out of the table before
//! being terminated, so no lock is ever held across an `.await`.

use std::collections::{BTreeSet, HashMap};
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::process::{Child, Command};
use warden_core::naming::validate_queue_name;

#[derive(Debug, thiserror::Error)]
pub enum SupervisorError {
    #[error("Invalid queue name: {0}")]
    InvalidQueueName(String),

    #[error("Failed to spawn worker for queue '{queue}': {source}")]
    Spawn {
        queue: String,
        #[source]
        source: std::io::Error,
    },
}

/// How worker subprocesses are launched: `<program> <args...> <queue>`.
#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    pub program: PathBuf,
    pub args: Vec<String>,
    /// Time between SIGTERM and SIGKILL.
    pub stop_grace: Duration,
    /// Extra environment for every worker, on top of the agent's own.
    pub env: Vec<(String, String)>,
}

pub struct ProcessSupervisor {
    config: SupervisorConfig,
    children: Mutex<HashMap<String, Child>>,
}

impl ProcessSupervisor {
    pub fn new(config: SupervisorConfig) -> Self {
        Self {
            config,
            children: Mutex::new(HashMap::new()),
        }
    }

    fn children(&self) -> MutexGuard<'_, HashMap<String, Child>> {
        self.children.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Start the worker for `queue`. Returns `false` if one is already running.
    pub fn start(&self, queue: &str) -> Result<bool, SupervisorError> {
        validate_queue_name(queue).map_err(|e| SupervisorError::InvalidQueueName(e.to_string()))?;

        let mut children = self.children();
        if let Some(child) = children.get_mut(queue) {
            if is_alive(child) {
                tracing::info!(queue = %queue, "Queue worker already running");
                return Ok(false);
            }
            tracing::warn!(queue = %queue, "Queue worker had exited, respawning");
            children.remove(queue);
        }

        let child = Command::new(&self.config.program)
            .args(&self.config.args)
            .arg(queue)
            .envs(self.config.env.iter().map(|(k, v)| (k, v)))
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| SupervisorError::Spawn {
                queue: queue.to_string(),
                source,
            })?;

        tracing::info!(queue = %queue, pid = ?child.id(), "Queue worker started");
        children.insert(queue.to_string(), child);
        Ok(true)
    }

    /// Stop the worker for `queue`. Returns `false` if none was running.
    pub async fn stop(&self, queue: &str) -> bool {
        let Some(mut child) = self.children().remove(queue) else {
            return false;
        };
        if !is_alive(&mut child) {
            tracing::debug!(queue = %queue, "Queue worker had already exited");
            return false;
        }

        terminate(queue, child, self.config.stop_grace).await;
        true
    }

    /// Names of queues with a live worker, sorted. Exited entries are dropped.
    pub fn list_running(&self) -> Vec<String> {
        let mut children = self.children();
        children.retain(|_, child| is_alive(child));
        let mut names: Vec<String> = children.keys().cloned().collect();
        names.sort();
        names
    }

    /// Stop every worker concurrently.
    pub async fn stop_all(&self) {
        let drained: Vec<(String, Child)> = self.children().drain().collect();
        if drained.is_empty() {
            return;
        }

        tracing::info!(count = drained.len(), "Stopping all queue workers");
        let grace = self.config.stop_grace;
        futures::future::join_all(
            drained
                .into_iter()
                .map(|(queue, child)| async move { terminate(&queue, child, grace).await }),
        )
        .await;
    }

    /// Make the running set equal `desired` and return it.
    pub async fn reconcile(&self, desired: &BTreeSet<String>) -> Result<Vec<String>, SupervisorError> {
        for queue in self.list_running() {
            if !desired.contains(&queue) {
                self.stop(&queue).await;
            }
        }
        for queue in desired {
            self.start(queue)?;
        }
        Ok(self.list_running())
    }
}

fn is_alive(child: &mut Child) -> bool {
    matches!(child.try_wait(), Ok(None))
}

/// SIGTERM, wait up to `grace`, then SIGKILL and reap.
async fn terminate(queue: &str, mut child: Child, grace: Duration) {
    send_sigterm(&mut child);

    match tokio::time::timeout(grace, child.wait()).await {
        Ok(Ok(status)) => {
            tracing::info!(queue = %queue, %status, "Queue worker stopped");
        }
        Ok(Err(e)) => {
            tracing::warn!(queue = %queue, error = %e, "Failed to wait for queue worker");
        }
        Err(_) => {
            tracing::warn!(
                queue = %queue,
                grace_secs = grace.as_secs_f64(),
                "Queue worker ignored SIGTERM, killing",
            );
            if let Err(e) = child.kill().await {
                tracing::warn!(queue = %queue, error = %e, "Failed to kill queue worker");
            }
        }
    }
}

#[cfg(unix)]
fn send_sigterm(child: &mut Child) {
    if let Some(pid) = child.id() {
        // SAFETY: `pid` belongs to a child we have not reaped yet.
        unsafe {
            libc::kill(pid as libc::pid_t, libc::SIGTERM);
        }
    }
}

#[cfg(not(unix))]
fn send_sigterm(child: &mut Child) {
    let _ = child.start_kill();
}
