//! Worker error types.

use abr_models::Resolution;
use thiserror::Error;

pub type TranscodeResult<T> = Result<T, TranscodeError>;

#[derive(Debug, Error)]
pub enum TranscodeError {
    #[error("Unsupported source resolution: {0}")]
    ResolutionUnsupported(String),

    #[error("Probe failed: {0}")]
    ProbeFailed(String),

    #[error("Transcoding {resolution} failed: {reason}")]
    SubtaskFailed {
        resolution: Resolution,
        reason: String,
    },

    #[error("Transcoding {0} cancelled")]
    SubtaskCancelled(Resolution),

    #[error("{0}")]
    PackagingFailed(String),

    #[error("Media error: {0}")]
    Media(#[from] abr_media::MediaError),

    #[error("Status error: {0}")]
    Status(#[from] abr_status::StatusError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl TranscodeError {
    pub fn probe_failed(msg: impl Into<String>) -> Self {
        Self::ProbeFailed(msg.into())
    }

    pub fn packaging_failed(msg: impl Into<String>) -> Self {
        Self::PackagingFailed(msg.into())
    }

    /// Errors caused by the submitted media rather than the service.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            TranscodeError::ResolutionUnsupported(_) | TranscodeError::ProbeFailed(_)
        )
    }
}
