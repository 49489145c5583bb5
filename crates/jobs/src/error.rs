use warden_core::backend::BackendError;

/// Errors returned by the [`JobController`](crate::JobController).
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error("Job '{0}' does not exist")]
    NotExistentJob(String),

    /// The job is still queued or running.
    #[error("Job '{0}' has not finished yet")]
    JobNotFinished(String),

    /// The job type is fire-and-forget.
    #[error("Job '{0}' has no result")]
    JobHasNoResult(String),

    #[error("Job failed: {0}")]
    JobFailed(String),

    #[error("Job '{0}' was revoked")]
    JobRevoked(String),

    #[error("Queue backend unavailable: {0}")]
    QueueBackendUnavailable(String),

    #[error("Validation failed: {0}")]
    Validation(String),
}

impl From<BackendError> for JobError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::Unavailable(msg) | BackendError::Internal(msg) => {
                JobError::QueueBackendUnavailable(msg)
            }
        }
    }
}
