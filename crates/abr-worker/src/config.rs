//! Worker configuration.

use std::path::PathBuf;
use std::time::Duration;

use abr_models::EncodingConfig;
use abr_status::{RegistryConfig, DEFAULT_SUBSCRIBER_CAPACITY};

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Root directory for per-job output and archives
    pub output_dir: PathBuf,
    /// Directory uploaded sources are written to
    pub upload_dir: PathBuf,
    /// Maximum jobs transcoding at the same time
    pub max_concurrent_jobs: usize,
    /// Mailbox capacity per status subscriber
    pub subscriber_buffer: usize,
    /// Kill a single encode after this long
    pub encode_timeout: Option<Duration>,
    /// Encoder settings shared by every rung
    pub encoding: EncodingConfig,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("./output"),
            upload_dir: PathBuf::from("./uploads"),
            max_concurrent_jobs: 2,
            subscriber_buffer: DEFAULT_SUBSCRIBER_CAPACITY,
            encode_timeout: None,
            encoding: EncodingConfig::default(),
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let mut encoding = defaults.encoding.clone();
        if let Ok(preset) = std::env::var("ABR_FFMPEG_PRESET") {
            encoding = encoding.with_preset(preset);
        }
        if let Some(crf) = std::env::var("ABR_FFMPEG_CRF")
            .ok()
            .and_then(|s| s.parse().ok())
        {
            encoding = encoding.with_crf(crf);
        }
        if let Some(secs) = std::env::var("ABR_HLS_SEGMENT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
        {
            encoding = encoding.with_segment_secs(secs);
        }

        Self {
            output_dir: std::env::var("ABR_OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.output_dir),
            upload_dir: std::env::var("ABR_UPLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.upload_dir),
            max_concurrent_jobs: std::env::var("ABR_MAX_JOBS")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|n| *n > 0)
                .unwrap_or(defaults.max_concurrent_jobs),
            subscriber_buffer: std::env::var("ABR_SUBSCRIBER_BUFFER")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|n| *n > 0)
                .unwrap_or(defaults.subscriber_buffer),
            encode_timeout: std::env::var("ABR_ENCODE_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs),
            encoding,
        }
    }

    pub fn registry_config(&self) -> RegistryConfig {
        RegistryConfig {
            subscriber_capacity: self.subscriber_buffer,
        }
    }
}
