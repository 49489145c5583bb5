//! Row model for the `jobs` table.

use serde_json::Value;
use sqlx::FromRow;
use warden_core::job::{JobRecord, JobStatus, JobType};
use warden_core::types::Timestamp;

/// A row from the `jobs` table, with `id` cast to text.
#[derive(Debug, Clone, FromRow)]
pub struct JobRow {
    pub id: String,
    pub queue: String,
    pub job_type: String,
    pub payload: Value,
    pub status: String,
    pub result: Option<Value>,
    pub error: Option<String>,
    pub has_result: bool,
    pub created_at: Timestamp,
    pub started_at: Option<Timestamp>,
    pub finished_at: Option<Timestamp>,
}

impl TryFrom<JobRow> for JobRecord {
    type Error = String;

    fn try_from(row: JobRow) -> Result<Self, Self::Error> {
        let job_type: JobType = row.job_type.parse().map_err(|e| format!("{e}"))?;
        let status: JobStatus = row.status.parse().map_err(|e| format!("{e}"))?;
        Ok(JobRecord {
            id: row.id,
            queue: row.queue,
            job_type,
            payload: row.payload,
            status,
            result: row.result,
            error: row.error,
            has_result: row.has_result,
            created_at: row.created_at,
            started_at: row.started_at,
            finished_at: row.finished_at,
        })
    }
}

/// One `(status, count)` pair from a grouped count.
#[derive(Debug, Clone, FromRow)]
pub struct StatusCount {
    pub status: String,
    pub count: i64,
}
