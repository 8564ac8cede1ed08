//! Registry error types.

use abr_models::JobId;
use thiserror::Error;

pub type StatusResult<T> = Result<T, StatusError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StatusError {
    #[error("Job not found: {0}")]
    NotFound(JobId),

    #[error("Job {0} has no cancellation handle")]
    NotCancellable(JobId),
}

impl StatusError {
    pub fn job_id(&self) -> &JobId {
        match self {
            StatusError::NotFound(id) | StatusError::NotCancellable(id) => id,
        }
    }
}
