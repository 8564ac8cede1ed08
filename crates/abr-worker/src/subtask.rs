//! Per-resolution transcode.

use std::path::PathBuf;
use std::sync::Arc;

use abr_media::{FfmpegCommand, FfmpegProgress, MediaBackend};
use abr_models::{
    EncodingConfig, JobId, PlaylistFragment, Resolution, StatusUpdate, TaskData, TranscodeSource,
};
use abr_status::StatusRegistry;
use tokio_util::sync::CancellationToken;

use crate::error::{TranscodeError, TranscodeResult};
use crate::logging::JobLogger;

/// Result of one resolution subtask.
#[derive(Debug, Clone, PartialEq)]
pub enum SubtaskOutcome {
    Completed(PlaylistFragment),
    /// The job's token fired; not an error on its own
    Cancelled,
    Failed(String),
}

impl SubtaskOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubtaskOutcome::Completed(_) => "completed",
            SubtaskOutcome::Cancelled => "cancelled",
            SubtaskOutcome::Failed(_) => "failed",
        }
    }

    pub fn into_result(self, resolution: Resolution) -> TranscodeResult<PlaylistFragment> {
        match self {
            SubtaskOutcome::Completed(fragment) => Ok(fragment),
            SubtaskOutcome::Cancelled => Err(TranscodeError::SubtaskCancelled(resolution)),
            SubtaskOutcome::Failed(reason) => {
                Err(TranscodeError::SubtaskFailed { resolution, reason })
            }
        }
    }
}

/// Output locations for one resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubtaskPaths {
    pub dir: PathBuf,
    pub playlist_filename: String,
    pub playlist_path: PathBuf,
    pub segment_pattern: PathBuf,
    pub path_from_main: String,
}

impl SubtaskPaths {
    /// `<job_dir>/<RES>/<stem>_<RES>p.m3u8` plus `<stem>_<RES>_%03d.ts` segments.
    pub fn new(job_dir: &std::path::Path, stem: &str, resolution: Resolution) -> Self {
        let tag = resolution.to_string();
        let dir = job_dir.join(&tag);
        let playlist_filename = format!("{}_{}p.m3u8", stem, tag);

        Self {
            playlist_path: dir.join(&playlist_filename),
            segment_pattern: dir.join(format!("{}_{}_%03d.ts", stem, tag)),
            path_from_main: format!("{}/{}", tag, playlist_filename),
            playlist_filename,
            dir,
        }
    }
}

/// Transcodes the job source into single resolutions.
///
/// One runner is shared by every subtask of a job.
pub struct SubtaskRunner {
    job_id: JobId,
    source: TranscodeSource,
    job_dir: PathBuf,
    duration_secs: f64,
    encoding: EncodingConfig,
    backend: Arc<dyn MediaBackend>,
    registry: Arc<StatusRegistry>,
    logger: JobLogger,
}

impl SubtaskRunner {
    pub fn new(
        job_id: JobId,
        source: TranscodeSource,
        job_dir: PathBuf,
        duration_secs: f64,
        encoding: EncodingConfig,
        backend: Arc<dyn MediaBackend>,
        registry: Arc<StatusRegistry>,
    ) -> Self {
        let logger = JobLogger::new(&job_id, "transcode_resolution");
        Self {
            job_id,
            source,
            job_dir,
            duration_secs,
            encoding,
            backend,
            registry,
            logger,
        }
    }

    pub fn paths(&self, resolution: Resolution) -> SubtaskPaths {
        SubtaskPaths::new(&self.job_dir, self.source.stem(), resolution)
    }

    /// Encode one resolution.
    pub async fn transcode(
        &self,
        cancel: CancellationToken,
        resolution: Resolution,
    ) -> SubtaskOutcome {
        if cancel.is_cancelled() {
            return SubtaskOutcome::Cancelled;
        }

        let preset = resolution.preset();
        let paths = self.paths(resolution);

        if let Err(e) = tokio::fs::create_dir_all(&paths.dir).await {
            return self.fail(
                resolution,
                format!("failed to create output directory {}: {}", paths.dir.display(), e),
            );
        }

        self.registry.publish(
            &self.job_id,
            StatusUpdate::started(format!("Transcoding {} started", resolution))
                .with_data(TaskData::for_resolution(resolution, 0.0)),
        );
        self.logger.log_subtask(resolution, "encode started");

        let cmd = FfmpegCommand::new(&self.source.path, &paths.playlist_path)
            .output_args(self.encoding.to_ffmpeg_args(&preset))
            .hls_segment_filename(&paths.segment_pattern);

        let on_progress = progress_publisher(
            Arc::clone(&self.registry),
            self.job_id.clone(),
            resolution,
            self.duration_secs,
        );

        match self.backend.encode(&cmd, &cancel, on_progress).await {
            Ok(()) => {}
            Err(e) if e.is_cancelled() => {
                self.logger.log_subtask(resolution, "encode cancelled");
                return SubtaskOutcome::Cancelled;
            }
            Err(e) => {
                return self.fail(resolution, e.detailed());
            }
        }

        self.registry.publish(
            &self.job_id,
            StatusUpdate::completed(format!("Transcoding {} completed", resolution))
                .with_data(TaskData::for_resolution(resolution, 100.0)),
        );

        let dimensions = match self.backend.probe_dimensions(&paths.playlist_path).await {
            Ok(dimensions) => dimensions,
            Err(e) => {
                return self.fail(
                    resolution,
                    format!("failed to probe {}: {}", paths.playlist_filename, e.detailed()),
                );
            }
        };

        self.logger.log_subtask(
            resolution,
            &format!("encoded at {}x{}", dimensions.width, dimensions.height),
        );

        SubtaskOutcome::Completed(PlaylistFragment {
            resolution,
            detected_width: dimensions.width,
            detected_height: dimensions.height,
            bitrate_kbps: preset.bitrate_kbps,
            playlist_filename: paths.playlist_filename,
            path_from_main: paths.path_from_main,
            playlist_path: paths.playlist_path,
        })
    }

    fn fail(&self, resolution: Resolution, reason: String) -> SubtaskOutcome {
        self.logger.log_subtask_error(resolution, &reason);
        self.registry.publish(
            &self.job_id,
            StatusUpdate::failed(format!("Transcoding {} failed: {}", resolution, reason))
                .with_data(TaskData::for_resolution(resolution, 0.0)),
        );
        SubtaskOutcome::Failed(reason)
    }
}

/// Progress callback that republishes encoder progress for one resolution.
fn progress_publisher(
    registry: Arc<StatusRegistry>,
    job_id: JobId,
    resolution: Resolution,
    duration_secs: f64,
) -> abr_media::ProgressCallback {
    Box::new(move |progress: FfmpegProgress| {
        registry.publish(&job_id, progress_update(resolution, &progress, duration_secs));
    })
}

/// Status update for one parsed progress snapshot.
pub fn progress_update(
    resolution: Resolution,
    progress: &FfmpegProgress,
    duration_secs: f64,
) -> StatusUpdate {
    StatusUpdate::progress(format!(
        "Transcoding {}: frame {}, time {}, speed {}x",
        resolution, progress.frame, progress.out_time, progress.speed
    ))
    .with_data(TaskData {
        resolution: resolution.to_string(),
        frame: progress.frame.to_string(),
        timestamp: progress.elapsed_seconds() as i64,
        progress: progress.percentage(duration_secs),
    })
}
