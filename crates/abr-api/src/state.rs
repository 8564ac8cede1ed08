//! Application state.

use std::path::PathBuf;

use abr_worker::{JobDriver, WorkerConfig};

use crate::config::ApiConfig;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    /// Where uploads are written before the driver takes them over
    pub upload_dir: PathBuf,
    pub driver: JobDriver,
}

impl AppState {
    /// Create state backed by FFmpeg and the local filesystem.
    pub async fn new(config: ApiConfig, worker: WorkerConfig) -> std::io::Result<Self> {
        tokio::fs::create_dir_all(&worker.upload_dir).await?;
        tokio::fs::create_dir_all(&worker.output_dir).await?;

        let driver = JobDriver::from_config(&worker);
        Ok(Self::with_driver(config, worker.upload_dir, driver))
    }

    pub fn with_driver(config: ApiConfig, upload_dir: impl Into<PathBuf>, driver: JobDriver) -> Self {
        Self {
            config,
            upload_dir: upload_dir.into(),
            driver,
        }
    }
}
