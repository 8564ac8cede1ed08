//! Status updates broadcast to job subscribers.
//!
//! A [`StatusUpdate`] is the only payload pushed over a status stream. Its
//! JSON form is part of the public contract: every field is named, numbers
//! stay numbers and `timestamp` is integer milliseconds since the epoch.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::Resolution;

/// Kind of status update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum StatusKind {
    Started,
    Progress,
    Completed,
    Failed,
    Cancelled,
}

impl StatusKind {
    /// Get string representation of the kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            StatusKind::Started => "started",
            StatusKind::Progress => "progress",
            StatusKind::Completed => "completed",
            StatusKind::Failed => "failed",
            StatusKind::Cancelled => "cancelled",
        }
    }

    /// Check if this kind ends a job (or a resolution subtask).
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            StatusKind::Completed | StatusKind::Failed | StatusKind::Cancelled
        )
    }
}

impl std::fmt::Display for StatusKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Per-resolution payload attached to subtask updates.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TaskData {
    /// Target resolution tag, e.g. "720P"
    pub resolution: String,
    /// Frame marker reported by the encoder
    pub frame: String,
    /// Position in the source media reached, in whole seconds
    pub timestamp: i64,
    /// Percentage of the resolution completed (0-100)
    pub progress: f64,
}

impl TaskData {
    /// Payload for a resolution with only a progress value.
    pub fn for_resolution(resolution: Resolution, progress: f64) -> Self {
        Self {
            resolution: resolution.to_string(),
            progress,
            ..Default::default()
        }
    }
}

/// Immutable snapshot of a job's state at a point in time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct StatusUpdate {
    #[serde(rename = "type")]
    pub kind: StatusKind,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<TaskData>,
    /// Archive reference on the final job-level `completed` update
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub archive: Option<String>,
    /// Broadcast time in Unix milliseconds; assigned by the registry
    #[serde(default)]
    pub timestamp: i64,
}

impl StatusUpdate {
    /// Create an update without a payload.
    pub fn new(kind: StatusKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            data: None,
            archive: None,
            timestamp: 0,
        }
    }

    pub fn started(message: impl Into<String>) -> Self {
        Self::new(StatusKind::Started, message)
    }

    pub fn progress(message: impl Into<String>) -> Self {
        Self::new(StatusKind::Progress, message)
    }

    pub fn completed(message: impl Into<String>) -> Self {
        Self::new(StatusKind::Completed, message)
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self::new(StatusKind::Failed, message)
    }

    pub fn cancelled(message: impl Into<String>) -> Self {
        Self::new(StatusKind::Cancelled, message)
    }

    /// Attach a per-resolution payload.
    pub fn with_data(mut self, data: TaskData) -> Self {
        self.data = Some(data);
        self
    }

    /// Attach the archive reference.
    pub fn with_archive(mut self, archive: impl Into<String>) -> Self {
        self.archive = Some(archive.into());
        self
    }

    /// Resolution tag this update refers to, if it is subtask-scoped.
    pub fn resolution(&self) -> Option<&str> {
        self.data.as_ref().map(|d| d.resolution.as_str())
    }

    /// Check if this update is a job-level terminal update.
    pub fn is_job_terminal(&self) -> bool {
        self.data.is_none() && self.kind.is_terminal()
    }
}
