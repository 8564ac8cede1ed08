//! Structured job logging utilities.
//!
//! Every line carries the job id and, for subtask events, the resolution tag,
//! so one job can be followed through the interleaved output of its
//! concurrent encodes.

use abr_models::{JobId, Resolution};
use tracing::{error, info, warn, Span};

/// Job logger for structured logging with consistent formatting.
///
/// Stamps every event with the job id and the operation name; the
/// `log_subtask*` helpers add the resolution of the rung being encoded.
#[derive(Debug, Clone)]
pub struct JobLogger {
    job_id: String,
    operation: String,
}

impl JobLogger {
    /// Create a new job logger for a specific job and operation.
    ///
    /// # Arguments
    /// * `job_id` - The job whose ladder is being built
    /// * `operation` - What the job does (e.g., "hls_ladder")
    pub fn new(job_id: &JobId, operation: &str) -> Self {
        Self {
            job_id: job_id.to_string(),
            operation: operation.to_string(),
        }
    }

    /// Log the start of a job, usually with the source filename.
    pub fn log_start(&self, message: &str) {
        info!(
            job_id = %self.job_id,
            operation = %self.operation,
            "Job started: {}", message
        );
    }

    /// Log a job-level milestone (probe result, selected targets).
    pub fn log_progress(&self, message: &str) {
        info!(
            job_id = %self.job_id,
            operation = %self.operation,
            "Job progress: {}", message
        );
    }

    /// Log a recoverable problem, such as a failed cleanup.
    pub fn log_warning(&self, message: &str) {
        warn!(
            job_id = %self.job_id,
            operation = %self.operation,
            "Job warning: {}", message
        );
    }

    /// Log the reason a job failed.
    pub fn log_error(&self, message: &str) {
        error!(
            job_id = %self.job_id,
            operation = %self.operation,
            "Job error: {}", message
        );
    }

    /// Log a successful job with where its archive landed.
    pub fn log_completion(&self, message: &str) {
        info!(
            job_id = %self.job_id,
            operation = %self.operation,
            "Job completed: {}", message
        );
    }

    /// Log a subtask event tagged with its resolution.
    pub fn log_subtask(&self, resolution: Resolution, message: &str) {
        info!(
            job_id = %self.job_id,
            operation = %self.operation,
            resolution = %resolution,
            "Subtask: {}", message
        );
    }

    /// Log a subtask failure tagged with its resolution.
    pub fn log_subtask_error(&self, resolution: Resolution, message: &str) {
        error!(
            job_id = %self.job_id,
            operation = %self.operation,
            resolution = %resolution,
            "Subtask error: {}", message
        );
    }

    /// Get the job ID.
    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    /// Get the operation type.
    pub fn operation(&self) -> &str {
        &self.operation
    }

    /// Create a tracing span for this job.
    ///
    /// The pipeline instruments its run with this span and subtasks inherit
    /// it, so encoder events from every rung nest under the job.
    pub fn create_span(&self) -> Span {
        tracing::info_span!(
            "job",
            job_id = %self.job_id,
            operation = %self.operation
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_logger_creation() {
        let job_id = JobId::new();
        let logger = JobLogger::new(&job_id, "hls_ladder");

        assert_eq!(logger.job_id(), job_id.to_string());
        assert_eq!(logger.operation(), "hls_ladder");
    }
}
