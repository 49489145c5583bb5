//! Queue counters and desired-queue-set parsing.

use std::collections::BTreeSet;

use serde::Serialize;

use crate::error::CoreError;
use crate::job::JobType;
use crate::naming::validate_queue_name;

/// Keyword selecting every known queue in `WORKER_QUEUES`.
pub const ALL_QUEUES_KEYWORD: &str = "ALL";

/// Per-queue job counts. Informational only.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct QueueCounters {
    pub queued: u64,
    pub running: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub revoked: u64,
}

/// Parse a desired queue set: `ALL` or a comma-separated list of names.
///
/// Blank entries are skipped. Every name is validated with
/// [`validate_queue_name`].
pub fn parse_queue_set(spec: &str) -> Result<BTreeSet<String>, CoreError> {
    let trimmed = spec.trim();
    if trimmed.eq_ignore_ascii_case(ALL_QUEUES_KEYWORD) {
        return Ok(JobType::all_queues()
            .into_iter()
            .map(str::to_string)
            .collect());
    }

    let mut queues = BTreeSet::new();
    for name in trimmed.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        validate_queue_name(name)?;
        queues.insert(name.to_string());
    }
    Ok(queues)
}
