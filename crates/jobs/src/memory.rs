//! Process-local backends for tests and single-process deployments.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use chrono::Utc;
use warden_core::backend::{Attribute, AttributeStore, BackendError, QueueBackend};
use warden_core::job::{JobOutcome, JobRecord, JobStatus, NewJob};
use warden_core::queue::QueueCounters;
use warden_core::types::JobId;

#[derive(Default)]
struct Jobs {
    records: HashMap<JobId, JobRecord>,
    /// Insertion order, for FIFO dequeue.
    order: VecDeque<JobId>,
}

/// [`QueueBackend`] kept entirely in memory.
pub struct InMemoryBackend {
    jobs: Mutex<Jobs>,
    available: AtomicBool,
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self {
            jobs: Mutex::new(Jobs::default()),
            available: AtomicBool::new(true),
        }
    }
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate the backend going away (or coming back).
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), BackendError> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(BackendError::Unavailable("in-memory backend is offline".into()))
        }
    }

    fn jobs(&self) -> std::sync::MutexGuard<'_, Jobs> {
        self.jobs.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl QueueBackend for InMemoryBackend {
    async fn enqueue(&self, job: NewJob) -> Result<JobId, BackendError> {
        self.check()?;
        let id = uuid::Uuid::new_v4().to_string();
        let record = JobRecord {
            id: id.clone(),
            queue: job.queue,
            job_type: job.job_type,
            payload: job.payload,
            status: JobStatus::Queued,
            result: None,
            error: None,
            has_result: job.job_type.has_result(),
            created_at: Utc::now(),
            started_at: None,
            finished_at: None,
        };

        let mut jobs = self.jobs();
        jobs.records.insert(id.clone(), record);
        jobs.order.push_back(id.clone());
        Ok(id)
    }

    async fn fetch(&self, job_id: &str) -> Result<Option<JobRecord>, BackendError> {
        self.check()?;
        Ok(self.jobs().records.get(job_id).cloned())
    }

    async fn revoke(&self, job_id: &str) -> Result<Option<JobStatus>, BackendError> {
        self.check()?;
        let mut jobs = self.jobs();
        let Some(job) = jobs.records.get_mut(job_id) else {
            return Ok(None);
        };

        let prior = job.status;
        if prior.is_cancelable() {
            job.status = JobStatus::Revoked;
            job.finished_at = Some(Utc::now());
        }
        Ok(Some(prior))
    }

    async fn dequeue(&self, queue: &str) -> Result<Option<JobRecord>, BackendError> {
        self.check()?;
        let mut jobs = self.jobs();
        let Jobs { records, order } = &mut *jobs;

        // Terminal and claimed ids are dropped from the FIFO as we pass them.
        let mut claimed = None;
        order.retain(|id| {
            let Some(job) = records.get_mut(id) else {
                return false;
            };
            if job.status != JobStatus::Queued {
                return false;
            }
            if claimed.is_none() && job.queue == queue {
                job.status = JobStatus::InProgress;
                job.started_at = Some(Utc::now());
                claimed = Some(job.clone());
                return false;
            }
            true
        });
        Ok(claimed)
    }

    async fn complete(&self, job_id: &str, outcome: JobOutcome) -> Result<bool, BackendError> {
        self.check()?;
        let mut jobs = self.jobs();
        let Some(job) = jobs.records.get_mut(job_id) else {
            return Ok(false);
        };
        if job.status != JobStatus::InProgress {
            return Ok(false);
        }

        match outcome {
            JobOutcome::Success(result) => {
                job.status = JobStatus::Success;
                job.result = if job.has_result { result } else { None };
            }
            JobOutcome::Failed(error) => {
                job.status = JobStatus::Failed;
                job.error = Some(error);
            }
        }
        job.finished_at = Some(Utc::now());
        Ok(true)
    }

    async fn counters(&self, queue: &str) -> Result<QueueCounters, BackendError> {
        self.check()?;
        let mut counters = QueueCounters::default();
        for job in self.jobs().records.values().filter(|j| j.queue == queue) {
            match job.status {
                JobStatus::Queued => counters.queued += 1,
                JobStatus::InProgress => counters.running += 1,
                JobStatus::Success => counters.succeeded += 1,
                JobStatus::Failed => counters.failed += 1,
                JobStatus::Revoked => counters.revoked += 1,
            }
        }
        Ok(counters)
    }
}

/// [`AttributeStore`] over a fixed in-memory list.
#[derive(Default)]
pub struct InMemoryAttributeStore {
    attributes: Mutex<Vec<Attribute>>,
}

impl InMemoryAttributeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, event_id: &str, value: &str) -> Attribute {
        let mut attributes = self
            .attributes
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let attribute = Attribute {
            id: (attributes.len() + 1).to_string(),
            event_id: event_id.to_string(),
            value: value.to_string(),
        };
        attributes.push(attribute.clone());
        attribute
    }
}

#[async_trait]
impl AttributeStore for InMemoryAttributeStore {
    async fn count_by_value(&self, value: &str) -> Result<u64, BackendError> {
        Ok(self
            .attributes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|a| a.value == value)
            .count() as u64)
    }

    async fn find_by_value(
        &self,
        value: &str,
        limit: u64,
    ) -> Result<Vec<Attribute>, BackendError> {
        Ok(self
            .attributes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|a| a.value == value)
            .take(usize::try_from(limit).unwrap_or(usize::MAX))
            .cloned()
            .collect())
    }
}
