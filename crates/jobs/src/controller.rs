//! Stateless job-management façade over a [`QueueBackend`].
//!
//! The controller holds nothing but the backend handle: every call is a
//! round trip, and two controllers over the same backend are
//! interchangeable.

use std::sync::Arc;

use serde_json::Value;
use warden_core::backend::QueueBackend;
use warden_core::job::{JobStatus, JobType, NewJob};
use warden_core::queue::QueueCounters;
use warden_core::types::JobId;

use crate::error::JobError;

#[derive(Clone)]
pub struct JobController {
    backend: Arc<dyn QueueBackend>,
}

impl JobController {
    pub fn new(backend: Arc<dyn QueueBackend>) -> Self {
        Self { backend }
    }

    /// Enqueue a job on `queue_name`.
    ///
    /// The queue must be the one `job_type` is routed to.
    pub async fn create_job(
        &self,
        queue_name: &str,
        job_type: JobType,
        payload: Value,
    ) -> Result<JobId, JobError> {
        if queue_name != job_type.queue_name() {
            return Err(JobError::Validation(format!(
                "job type '{job_type}' runs on queue '{}', not '{queue_name}'",
                job_type.queue_name()
            )));
        }

        let job_id = self
            .backend
            .enqueue(NewJob {
                queue: queue_name.to_string(),
                job_type,
                payload,
            })
            .await?;

        tracing::info!(job_id = %job_id, queue = %queue_name, job_type = %job_type, "Job enqueued");
        Ok(job_id)
    }

    /// Enqueue a job on its type's queue.
    pub async fn submit(&self, job_type: JobType, payload: Value) -> Result<JobId, JobError> {
        self.create_job(job_type.queue_name(), job_type, payload).await
    }

    pub async fn get_status(&self, job_id: &str) -> Result<JobStatus, JobError> {
        self.backend
            .fetch_status(job_id)
            .await?
            .ok_or_else(|| JobError::NotExistentJob(job_id.to_string()))
    }

    /// The stored result of a successful job.
    pub async fn get_result(&self, job_id: &str) -> Result<Value, JobError> {
        let job = self
            .backend
            .fetch(job_id)
            .await?
            .ok_or_else(|| JobError::NotExistentJob(job_id.to_string()))?;

        match job.status {
            JobStatus::Queued | JobStatus::InProgress => {
                Err(JobError::JobNotFinished(job_id.to_string()))
            }
            JobStatus::Failed => Err(JobError::JobFailed(
                job.error.unwrap_or_else(|| "unknown error".to_string()),
            )),
            JobStatus::Revoked => Err(JobError::JobRevoked(job_id.to_string())),
            JobStatus::Success if !job.has_result => {
                Err(JobError::JobHasNoResult(job_id.to_string()))
            }
            JobStatus::Success => Ok(job.result.unwrap_or(Value::Null)),
        }
    }

    /// Request revocation. `true` only if the job was queued or running.
    pub async fn cancel_job(&self, job_id: &str) -> Result<bool, JobError> {
        let prior = self
            .backend
            .revoke(job_id)
            .await?
            .ok_or_else(|| JobError::NotExistentJob(job_id.to_string()))?;

        let canceled = prior.is_cancelable();
        if canceled {
            tracing::info!(job_id = %job_id, prior = %prior, "Job revoked");
        }
        Ok(canceled)
    }

    /// Counters for every known queue, in routing-table order.
    pub async fn queue_overview(&self) -> Result<Vec<(String, QueueCounters)>, JobError> {
        let mut overview = Vec::new();
        for queue in JobType::all_queues() {
            let counters = self.backend.counters(queue).await?;
            overview.push((queue.to_string(), counters));
        }
        Ok(overview)
    }

    pub fn backend(&self) -> &Arc<dyn QueueBackend> {
        &self.backend
    }
}
