//! Seam between the job orchestration and the FFmpeg CLI.

use std::path::Path;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};
use crate::probe::{get_duration, probe_dimensions, Dimensions};
use crate::progress::ProgressCallback;

/// Media operations needed to build an adaptive-bitrate ladder.
#[async_trait]
pub trait MediaBackend: Send + Sync + 'static {
    /// Dimensions of the first video stream of a file or playlist.
    async fn probe_dimensions(&self, path: &Path) -> MediaResult<Dimensions>;

    /// Duration of the media in seconds.
    async fn probe_duration(&self, path: &Path) -> MediaResult<f64>;

    /// Run an encode to completion.
    ///
    /// Must return [`MediaError::Cancelled`] when `cancel` fires before the
    /// encode finishes.
    async fn encode(
        &self,
        cmd: &FfmpegCommand,
        cancel: &CancellationToken,
        on_progress: ProgressCallback,
    ) -> MediaResult<()>;
}

/// Backend that shells out to `ffmpeg` and `ffprobe`.
#[derive(Debug, Clone, Default)]
pub struct FfmpegBackend {
    timeout_secs: Option<u64>,
}

impl FfmpegBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Kill encodes that run longer than `secs`.
    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }
}

#[async_trait]
impl MediaBackend for FfmpegBackend {
    async fn probe_dimensions(&self, path: &Path) -> MediaResult<Dimensions> {
        probe_dimensions(path).await
    }

    async fn probe_duration(&self, path: &Path) -> MediaResult<f64> {
        let duration = get_duration(path).await?;
        if duration <= 0.0 {
            return Err(MediaError::InvalidVideo(format!(
                "non-positive duration {} for {}",
                duration,
                path.display()
            )));
        }
        Ok(duration)
    }

    async fn encode(
        &self,
        cmd: &FfmpegCommand,
        cancel: &CancellationToken,
        on_progress: ProgressCallback,
    ) -> MediaResult<()> {
        let mut runner = FfmpegRunner::new().with_cancel(cancel.clone());
        if let Some(secs) = self.timeout_secs {
            runner = runner.with_timeout(secs);
        }
        runner.run_with_progress(cmd, on_progress).await
    }
}
