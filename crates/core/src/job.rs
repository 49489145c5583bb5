//! Job lifecycle types and the job-type → queue routing table.
//!
//! Routing is a plain enum so the scheduler never depends on a backend's
//! own task registry: every [`JobType`] names exactly one queue, and a
//! queue exists as soon as a job type references it.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::CoreError;
use crate::types::{JobId, Timestamp};

// ---------------------------------------------------------------------------
// Queue names
// ---------------------------------------------------------------------------

pub const QUEUE_CORRELATION: &str = "correlation";
pub const QUEUE_ENRICHMENT: &str = "enrichment";
pub const QUEUE_NOTIFICATION: &str = "notification";

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

/// Lifecycle state of a job.
///
/// `Success`, `Failed` and `Revoked` are terminal: backends must not
/// mutate a job once it has reached one of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    InProgress,
    Success,
    Failed,
    Revoked,
}

impl JobStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::InProgress => "in_progress",
            Self::Success => "success",
            Self::Failed => "failed",
            Self::Revoked => "revoked",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Success | Self::Failed | Self::Revoked)
    }

    /// Whether a revocation request can still affect the job.
    pub fn is_cancelable(self) -> bool {
        matches!(self, Self::Queued | Self::InProgress)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "queued" => Ok(Self::Queued),
            "in_progress" => Ok(Self::InProgress),
            "success" => Ok(Self::Success),
            "failed" => Ok(Self::Failed),
            "revoked" => Ok(Self::Revoked),
            other => Err(CoreError::Validation(format!("Unknown job status '{other}'"))),
        }
    }
}

// ---------------------------------------------------------------------------
// Job types
// ---------------------------------------------------------------------------

/// Every kind of job the fleet knows how to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobType {
    /// Correlate a single attribute value against stored attributes.
    #[serde(alias = "correlate")]
    CorrelateValue,
    /// Run a registered correlation plugin.
    CorrelationPlugin,
    /// Run a registered enrichment plugin.
    Enrichment,
    /// POST a payload to an external URL. Produces no result.
    WebhookNotify,
}

impl JobType {
    pub const ALL: [JobType; 4] = [
        Self::CorrelateValue,
        Self::CorrelationPlugin,
        Self::Enrichment,
        Self::WebhookNotify,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::CorrelateValue => "correlate_value",
            Self::CorrelationPlugin => "correlation_plugin",
            Self::Enrichment => "enrichment",
            Self::WebhookNotify => "webhook_notify",
        }
    }

    /// The queue this job type is routed to.
    pub fn queue_name(self) -> &'static str {
        match self {
            Self::CorrelateValue | Self::CorrelationPlugin => QUEUE_CORRELATION,
            Self::Enrichment => QUEUE_ENRICHMENT,
            Self::WebhookNotify => QUEUE_NOTIFICATION,
        }
    }

    /// Fire-and-forget job types define no result value.
    pub fn has_result(self) -> bool {
        !matches!(self, Self::WebhookNotify)
    }

    /// Every distinct queue name, in routing-table order.
    pub fn all_queues() -> Vec<&'static str> {
        let mut queues: Vec<&'static str> = Vec::new();
        for job_type in Self::ALL {
            let queue = job_type.queue_name();
            if !queues.contains(&queue) {
                queues.push(queue);
            }
        }
        queues
    }
}

impl fmt::Display for JobType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobType {
    type Err = CoreError;

    /// Accepts the canonical names plus `correlate` for `correlate_value`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "correlate" {
            return Ok(Self::CorrelateValue);
        }
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| CoreError::Validation(format!("Unknown job type '{s}'")))
    }
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// A job submission as handed to a queue backend.
#[derive(Debug, Clone)]
pub struct NewJob {
    pub queue: String,
    pub job_type: JobType,
    pub payload: Value,
}

/// A job as stored by a queue backend.
#[derive(Debug, Clone, Serialize)]
pub struct JobRecord {
    pub id: JobId,
    pub queue: String,
    pub job_type: JobType,
    pub payload: Value,
    pub status: JobStatus,
    /// Present only when `status` is `Success` and the job type has a result.
    pub result: Option<Value>,
    /// Present only when `status` is `Failed`.
    pub error: Option<String>,
    pub has_result: bool,
    pub created_at: Timestamp,
    pub started_at: Option<Timestamp>,
    pub finished_at: Option<Timestamp>,
}

/// How a worker finished a job.
#[derive(Debug, Clone, PartialEq)]
pub enum JobOutcome {
    /// `None` for job types without a result value.
    Success(Option<Value>),
    Failed(String),
}
