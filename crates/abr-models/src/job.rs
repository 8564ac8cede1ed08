//! Job identifiers and transcode sources.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Unique identifier for a transcoding job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Generate a new random job ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for JobId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// The uploaded media file a job transcodes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscodeSource {
    /// Where the file lives on disk
    pub path: PathBuf,
    /// Original filename as supplied by the client
    pub filename: String,
    /// Lower-cased extension including the leading dot (".mp4"), or empty
    pub extension: String,
}

impl TranscodeSource {
    /// Create a source, deriving the extension from the original filename.
    pub fn new(path: impl AsRef<Path>, filename: impl Into<String>) -> Self {
        let filename = filename.into();
        let extension = extension_of(&filename);
        Self {
            path: path.as_ref().to_path_buf(),
            filename,
            extension,
        }
    }

    /// Original filename without its extension.
    ///
    /// Used as the prefix of every generated playlist and segment name.
    pub fn stem(&self) -> &str {
        if self.extension.is_empty() {
            return &self.filename;
        }
        let Some(cut) = self.filename.len().checked_sub(self.extension.len()) else {
            return &self.filename;
        };
        match (self.filename.get(..cut), self.filename.get(cut..)) {
            (Some(stem), Some(tail)) if tail.eq_ignore_ascii_case(&self.extension) => stem,
            _ => &self.filename,
        }
    }
}

/// Lower-cased extension with leading dot, or an empty string.
pub fn extension_of(filename: &str) -> String {
    Path::new(filename)
        .extension()
        .map(|ext| format!(".{}", ext.to_string_lossy().to_lowercase()))
        .unwrap_or_default()
}
