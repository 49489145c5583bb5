//! [`QueueBackend`] and [`AttributeStore`] over PostgreSQL.

use async_trait::async_trait;
use uuid::Uuid;
use warden_core::backend::{Attribute, AttributeStore, BackendError, QueueBackend};
use warden_core::job::{JobOutcome, JobRecord, JobStatus, NewJob};
use warden_core::queue::QueueCounters;
use warden_core::types::JobId;

use crate::models::job::JobRow;
use crate::repositories::{AttributeRepo, JobRepo};
use crate::DbPool;

fn backend_error(err: sqlx::Error) -> BackendError {
    match err {
        sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed => BackendError::Unavailable(err.to_string()),
        other => BackendError::Internal(other.to_string()),
    }
}

fn to_record(row: JobRow) -> Result<JobRecord, BackendError> {
    JobRecord::try_from(row).map_err(BackendError::Internal)
}

/// A string that is not a UUID cannot name a stored job.
fn parse_id(job_id: &str) -> Option<Uuid> {
    Uuid::parse_str(job_id).ok()
}

#[derive(Clone)]
pub struct PgQueueBackend {
    pool: DbPool,
}

impl PgQueueBackend {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl QueueBackend for PgQueueBackend {
    async fn enqueue(&self, job: NewJob) -> Result<JobId, BackendError> {
        let row = JobRepo::insert(&self.pool, &job).await.map_err(backend_error)?;
        Ok(row.id)
    }

    async fn fetch(&self, job_id: &str) -> Result<Option<JobRecord>, BackendError> {
        let Some(id) = parse_id(job_id) else {
            return Ok(None);
        };
        JobRepo::find_by_id(&self.pool, id)
            .await
            .map_err(backend_error)?
            .map(to_record)
            .transpose()
    }

    async fn revoke(&self, job_id: &str) -> Result<Option<JobStatus>, BackendError> {
        let Some(id) = parse_id(job_id) else {
            return Ok(None);
        };
        JobRepo::revoke(&self.pool, id)
            .await
            .map_err(backend_error)?
            .map(|status| {
                status
                    .parse::<JobStatus>()
                    .map_err(|e| BackendError::Internal(e.to_string()))
            })
            .transpose()
    }

    async fn dequeue(&self, queue: &str) -> Result<Option<JobRecord>, BackendError> {
        JobRepo::claim_next(&self.pool, queue)
            .await
            .map_err(backend_error)?
            .map(to_record)
            .transpose()
    }

    async fn complete(&self, job_id: &str, outcome: JobOutcome) -> Result<bool, BackendError> {
        let Some(id) = parse_id(job_id) else {
            return Ok(false);
        };
        let written = match outcome {
            JobOutcome::Success(result) => JobRepo::complete(&self.pool, id, result.as_ref()).await,
            JobOutcome::Failed(error) => JobRepo::fail(&self.pool, id, &error).await,
        }
        .map_err(backend_error)?;

        if !written {
            tracing::debug!(job_id = %job_id, "Completion ignored, job no longer in progress");
        }
        Ok(written)
    }

    async fn counters(&self, queue: &str) -> Result<QueueCounters, BackendError> {
        let rows = JobRepo::count_by_status(&self.pool, queue)
            .await
            .map_err(backend_error)?;

        let mut counters = QueueCounters::default();
        for row in rows {
            let count = u64::try_from(row.count).unwrap_or(0);
            match row.status.parse::<JobStatus>() {
                Ok(JobStatus::Queued) => counters.queued = count,
                Ok(JobStatus::InProgress) => counters.running = count,
                Ok(JobStatus::Success) => counters.succeeded = count,
                Ok(JobStatus::Failed) => counters.failed = count,
                Ok(JobStatus::Revoked) => counters.revoked = count,
                Err(e) => tracing::warn!(queue = %queue, error = %e, "Unknown status in jobs table"),
            }
        }
        Ok(counters)
    }
}

#[derive(Clone)]
pub struct PgAttributeStore {
    pool: DbPool,
}

impl PgAttributeStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AttributeStore for PgAttributeStore {
    async fn count_by_value(&self, value: &str) -> Result<u64, BackendError> {
        let count = AttributeRepo::count_by_value(&self.pool, value)
            .await
            .map_err(backend_error)?;
        Ok(u64::try_from(count).unwrap_or(0))
    }

    async fn find_by_value(
        &self,
        value: &str,
        limit: u64,
    ) -> Result<Vec<Attribute>, BackendError> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = AttributeRepo::find_by_value(&self.pool, value, limit)
            .await
            .map_err(backend_error)?;
        Ok(rows.into_iter().map(Attribute::from).collect())
    }
}
