//! Contracts the fleet needs from its external collaborators.
//!
//! [`QueueBackend`] is the minimal job-queue contract: the master side
//! uses enqueue/fetch/revoke, the worker side uses dequeue/complete.
//! [`AttributeStore`] is the read-only view of persisted attributes that
//! correlation jobs query. Delivery guarantees (at-least-once,
//! persistence) are whatever the implementation provides.

use async_trait::async_trait;
use serde::Serialize;

use crate::job::{JobOutcome, JobRecord, JobStatus, NewJob};
use crate::queue::QueueCounters;
use crate::types::JobId;

/// Errors raised by backend implementations.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    /// The backend could not be reached or did not acknowledge the call.
    #[error("Queue backend unavailable: {0}")]
    Unavailable(String),

    /// The backend answered with something it should not have.
    #[error("Queue backend error: {0}")]
    Internal(String),
}

#[async_trait]
pub trait QueueBackend: Send + Sync {
    /// Store a new job in `Queued` state and return its backend-issued id.
    async fn enqueue(&self, job: NewJob) -> Result<JobId, BackendError>;

    /// Fetch the full job record, or `None` if the id is unknown.
    async fn fetch(&self, job_id: &str) -> Result<Option<JobRecord>, BackendError>;

    /// Fetch only the job status.
    async fn fetch_status(&self, job_id: &str) -> Result<Option<JobStatus>, BackendError> {
        Ok(self.fetch(job_id).await?.map(|job| job.status))
    }

    /// Request revocation.
    ///
    /// Returns the status the job had when the request was made, or `None`
    /// if the id is unknown. Terminal jobs are left untouched.
    async fn revoke(&self, job_id: &str) -> Result<Option<JobStatus>, BackendError>;

    /// Claim the oldest queued job of `queue`, moving it to `InProgress`.
    async fn dequeue(&self, queue: &str) -> Result<Option<JobRecord>, BackendError>;

    /// Record the outcome of an in-progress job.
    ///
    /// Returns `false` when the job was no longer in progress (e.g. it was
    /// revoked while running), in which case nothing is written.
    async fn complete(&self, job_id: &str, outcome: JobOutcome) -> Result<bool, BackendError>;

    /// Informational counters for one queue.
    async fn counters(&self, queue: &str) -> Result<QueueCounters, BackendError>;
}

/// One stored attribute value attached to an event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Attribute {
    pub id: String,
    pub event_id: String,
    pub value: String,
}

#[async_trait]
pub trait AttributeStore: Send + Sync {
    /// Number of attributes carrying exactly `value`.
    async fn count_by_value(&self, value: &str) -> Result<u64, BackendError>;

    /// Up to `limit` attributes carrying exactly `value`.
    async fn find_by_value(&self, value: &str, limit: u64)
        -> Result<Vec<Attribute>, BackendError>;
}
