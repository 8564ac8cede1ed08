//! Job and subtask metrics.

use metrics::{counter, gauge, histogram};

/// Metric names as constants for consistency.
pub mod names {
    pub const JOBS_STARTED_TOTAL: &str = "abr_jobs_started_total";
    pub const JOBS_FINISHED_TOTAL: &str = "abr_jobs_finished_total";
    pub const JOB_DURATION_SECONDS: &str = "abr_job_duration_seconds";
    pub const SUBTASKS_TOTAL: &str = "abr_subtasks_total";
    pub const ACTIVE_JOBS: &str = "abr_active_jobs";
}

pub fn record_job_started() {
    counter!(names::JOBS_STARTED_TOTAL).increment(1);
}

/// Record a finished job by terminal outcome ("completed", "failed", "cancelled").
pub fn record_job_finished(outcome: &'static str, duration_secs: f64) {
    counter!(names::JOBS_FINISHED_TOTAL, "outcome" => outcome).increment(1);
    histogram!(names::JOB_DURATION_SECONDS, "outcome" => outcome).record(duration_secs);
}

pub fn record_subtask(resolution: String, outcome: &'static str) {
    counter!(names::SUBTASKS_TOTAL, "resolution" => resolution, "outcome" => outcome).increment(1);
}

pub fn set_active_jobs(count: usize) {
    gauge!(names::ACTIVE_JOBS).set(count as f64);
}
