//! Dequeue → execute → complete loop for one queue.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use warden_core::backend::{BackendError, QueueBackend};

use crate::runner::JobRunner;

pub struct Consumer {
    queue: String,
    backend: Arc<dyn QueueBackend>,
    runner: JobRunner,
    poll_interval: Duration,
}

impl Consumer {
    pub fn new(
        queue: impl Into<String>,
        backend: Arc<dyn QueueBackend>,
        runner: JobRunner,
        poll_interval: Duration,
    ) -> Self {
        Self {
            queue: queue.into(),
            backend,
            runner,
            poll_interval,
        }
    }

    /// Claim and run at most one job. Returns whether a job was claimed.
    pub async fn run_once(&self) -> Result<bool, BackendError> {
        let Some(job) = self.backend.dequeue(&self.queue).await? else {
            return Ok(false);
        };

        tracing::info!(job_id = %job.id, queue = %self.queue, job_type = %job.job_type, "Job claimed");
        let outcome = self.runner.run(&job).await;
        let written = self.backend.complete(&job.id, outcome).await?;
        if written {
            tracing::info!(job_id = %job.id, "Job finished");
        } else {
            tracing::info!(job_id = %job.id, "Job was revoked while running, result discarded");
        }
        Ok(true)
    }

    /// Consume until `cancel` fires. A running job is always finished
    /// before the loop exits.
    pub async fn run(&self, cancel: CancellationToken) {
        tracing::info!(queue = %self.queue, "Consumer started");

        while !cancel.is_cancelled() {
            let idle = match self.run_once().await {
                Ok(claimed) => !claimed,
                Err(e) => {
                    tracing::warn!(queue = %self.queue, error = %e, "Queue backend error");
                    true
                }
            };

            if idle {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(self.poll_interval) => {}
                }
            }
        }

        tracing::info!(queue = %self.queue, "Consumer stopped");
    }
}
