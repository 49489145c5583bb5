//! Repository for the `jobs` table.
//!
//! Status transitions are conditional updates so a terminal row is never
//! rewritten, whatever the interleaving of workers and cancel requests.

use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;
use warden_core::job::{JobStatus, NewJob};

use crate::models::job::{JobRow, StatusCount};

/// Column list for `jobs` queries.
const COLUMNS: &str = "\
    id::text AS id, queue, job_type, payload, status, result, error, \
    has_result, created_at, started_at, finished_at";

pub struct JobRepo;

impl JobRepo {
    /// Insert a new queued job.
    pub async fn insert(pool: &PgPool, job: &NewJob) -> Result<JobRow, sqlx::Error> {
        let query = format!(
            "INSERT INTO jobs (queue, job_type, payload, status, has_result) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, JobRow>(&query)
            .bind(&job.queue)
            .bind(job.job_type.as_str())
            .bind(&job.payload)
            .bind(JobStatus::Queued.as_str())
            .bind(job.job_type.has_result())
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<JobRow>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM jobs WHERE id = $1");
        sqlx::query_as::<_, JobRow>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Revoke a job that is still queued or running.
    ///
    /// Returns the status the row had before the statement, or `None` if
    /// it does not exist. The row is locked while the prior status is read.
    pub async fn revoke(pool: &PgPool, id: Uuid) -> Result<Option<String>, sqlx::Error> {
        let row: Option<(String,)> = sqlx::query_as(
            "WITH prior AS ( \
                 SELECT id, status FROM jobs WHERE id = $1 FOR UPDATE \
             ), revoked AS ( \
                 UPDATE jobs j SET status = $2, finished_at = NOW() \
                 FROM prior \
                 WHERE j.id = prior.id AND prior.status IN ($3, $4) \
             ) \
             SELECT status FROM prior",
        )
        .bind(id)
        .bind(JobStatus::Revoked.as_str())
        .bind(JobStatus::Queued.as_str())
        .bind(JobStatus::InProgress.as_str())
        .fetch_optional(pool)
        .await?;
        Ok(row.map(|(status,)| status))
    }

    /// Atomically claim the oldest queued job of `queue`.
    ///
    /// Uses `SELECT FOR UPDATE SKIP LOCKED` so concurrent workers on the
    /// same queue never claim the same row.
    pub async fn claim_next(pool: &PgPool, queue: &str) -> Result<Option<JobRow>, sqlx::Error> {
        let query = format!(
            "UPDATE jobs \
             SET status = $2, started_at = NOW() \
             WHERE id = ( \
                 SELECT id FROM jobs \
                 WHERE queue = $1 AND status = $3 \
                 ORDER BY created_at ASC, id ASC \
                 LIMIT 1 \
                 FOR UPDATE SKIP LOCKED \
             ) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, JobRow>(&query)
            .bind(queue)
            .bind(JobStatus::InProgress.as_str())
            .bind(JobStatus::Queued.as_str())
            .fetch_optional(pool)
            .await
    }

    /// Mark an in-progress job successful. `result` is dropped for job
    /// types without a result.
    pub async fn complete(
        pool: &PgPool,
        id: Uuid,
        result: Option<&Value>,
    ) -> Result<bool, sqlx::Error> {
        let done = sqlx::query(
            "UPDATE jobs \
             SET status = $2, result = CASE WHEN has_result THEN $3 ELSE NULL END, \
                 finished_at = NOW() \
             WHERE id = $1 AND status = $4",
        )
        .bind(id)
        .bind(JobStatus::Success.as_str())
        .bind(result)
        .bind(JobStatus::InProgress.as_str())
        .execute(pool)
        .await?;
        Ok(done.rows_affected() > 0)
    }

    /// Mark an in-progress job failed.
    pub async fn fail(pool: &PgPool, id: Uuid, error: &str) -> Result<bool, sqlx::Error> {
        let done = sqlx::query(
            "UPDATE jobs \
             SET status = $2, error = $3, finished_at = NOW() \
             WHERE id = $1 AND status = $4",
        )
        .bind(id)
        .bind(JobStatus::Failed.as_str())
        .bind(error)
        .bind(JobStatus::InProgress.as_str())
        .execute(pool)
        .await?;
        Ok(done.rows_affected() > 0)
    }

    /// Job counts of one queue grouped by status.
    pub async fn count_by_status(
        pool: &PgPool,
        queue: &str,
    ) -> Result<Vec<StatusCount>, sqlx::Error> {
        sqlx::query_as::<_, StatusCount>(
            "SELECT status, COUNT(*) AS count FROM jobs WHERE queue = $1 GROUP BY status",
        )
        .bind(queue)
        .fetch_all(pool)
        .await
    }
}
