//! Job pipeline: one source in, one packaged HLS ladder out.
//!
//! The pipeline fans the source out into one subtask per target resolution,
//! waits for every subtask to report, then decides the job outcome:
//! cancellation beats everything, a single failed resolution fails the
//! whole job, and only a fully successful ladder is assembled and archived.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use abr_media::{MediaBackend, Packager};
use abr_models::{
    target_resolutions, EncodingConfig, JobId, PlaylistFragment, Resolution, StatusUpdate,
    TaskData, TranscodeSource,
};
use abr_status::StatusRegistry;
use futures_util::future::join_all;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::error::{TranscodeError, TranscodeResult};
use crate::logging::JobLogger;
use crate::manifest::write_master_playlist;
use crate::metrics;
use crate::subtask::{SubtaskOutcome, SubtaskRunner};

/// Final message of a successful job.
pub const COMPLETED_MESSAGE: &str =
    "Transcoding and archiving complete. Your download is ready.";

/// Collaborators shared by every job.
#[derive(Clone)]
pub struct PipelineDeps {
    pub backend: Arc<dyn MediaBackend>,
    pub packager: Arc<dyn Packager>,
    pub registry: Arc<StatusRegistry>,
    pub encoding: EncodingConfig,
}

/// Terminal outcome of a job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    Completed { archive: PathBuf },
    Failed { reason: String },
    Cancelled,
}

impl JobOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobOutcome::Completed { .. } => "completed",
            JobOutcome::Failed { .. } => "failed",
            JobOutcome::Cancelled => "cancelled",
        }
    }
}

/// A job whose source has been probed and whose targets are known.
pub struct JobPipeline {
    job_id: JobId,
    source: TranscodeSource,
    targets: Vec<Resolution>,
    duration_secs: f64,
    deps: PipelineDeps,
    logger: JobLogger,
}

impl JobPipeline {
    /// Probe the source and select target resolutions.
    ///
    /// Fails with [`TranscodeError::ResolutionUnsupported`] when no preset
    /// fits under the source height; no job should be handed out then.
    pub async fn prepare(
        job_id: JobId,
        source: TranscodeSource,
        deps: PipelineDeps,
    ) -> TranscodeResult<Self> {
        let dimensions = deps
            .backend
            .probe_dimensions(&source.path)
            .await
            .map_err(|e| TranscodeError::probe_failed(e.detailed()))?;

        let targets = target_resolutions(dimensions.height);
        if targets.is_empty() {
            return Err(TranscodeError::ResolutionUnsupported(format!(
                "{}x{}",
                dimensions.width, dimensions.height
            )));
        }

        let duration_secs = deps
            .backend
            .probe_duration(&source.path)
            .await
            .map_err(|e| TranscodeError::probe_failed(e.detailed()))?;
        if duration_secs <= 0.0 {
            return Err(TranscodeError::probe_failed(format!(
                "source reports non-positive duration {}",
                duration_secs
            )));
        }

        let logger = JobLogger::new(&job_id, "hls_ladder");
        logger.log_progress(&format!(
            "source {}x{}, {:.1}s, targets {:?}",
            dimensions.width, dimensions.height, duration_secs, targets
        ));

        Ok(Self {
            job_id,
            source,
            targets,
            duration_secs,
            deps,
            logger,
        })
    }

    pub fn job_id(&self) -> &JobId {
        &self.job_id
    }

    pub fn source(&self) -> &TranscodeSource {
        &self.source
    }

    /// Target resolutions in dispatch order (tallest first).
    pub fn targets(&self) -> &[Resolution] {
        &self.targets
    }

    /// Directory this job writes into.
    pub fn job_dir(&self) -> PathBuf {
        self.deps.packager.job_dir(&self.job_id)
    }

    /// Run the job to a terminal outcome, publishing it before returning.
    pub async fn run(&self, cancel: CancellationToken) -> JobOutcome {
        let span = self.logger.create_span();
        self.run_inner(cancel).instrument(span).await
    }

    async fn run_inner(&self, cancel: CancellationToken) -> JobOutcome {
        let registry = &self.deps.registry;

        registry.publish(
            &self.job_id,
            StatusUpdate::started(format!(
                "Transcoding {} into {} resolutions",
                self.source.filename,
                self.targets.len()
            )),
        );
        self.logger.log_start(&self.source.filename);

        let job_dir = match self.deps.packager.create_job_dir(&self.job_id).await {
            Ok(dir) => dir,
            Err(e) => {
                return self.fail(format!("Failed to create output directory: {}", e));
            }
        };

        let fragments = match self.transcode_all(&cancel, job_dir.clone()).await {
            Ok(fragments) => fragments,
            Err(outcome) => return outcome,
        };

        let archive = match self.package(&job_dir, &fragments).await {
            Ok(archive) => archive,
            Err(e) => return self.fail(e.to_string()),
        };

        if let Err(e) = self.deps.packager.remove_dir(&job_dir).await {
            self.logger.log_warning(&format!(
                "failed to clean up {}: {}",
                job_dir.display(),
                e
            ));
        }

        self.logger
            .log_completion(&format!("archive at {}", archive.display()));
        registry.publish(
            &self.job_id,
            StatusUpdate::completed(COMPLETED_MESSAGE)
                .with_archive(archive.to_string_lossy().to_string()),
        );

        JobOutcome::Completed { archive }
    }

    /// Write the master manifest next to the variants and archive the job
    /// directory.
    async fn package(
        &self,
        job_dir: &Path,
        fragments: &[PlaylistFragment],
    ) -> TranscodeResult<PathBuf> {
        let registry = &self.deps.registry;

        registry.publish(
            &self.job_id,
            StatusUpdate::progress("Generating master playlist..."),
        );
        write_master_playlist(job_dir, fragments).await.map_err(|e| {
            TranscodeError::packaging_failed(format!("Failed to write master playlist: {}", e))
        })?;

        registry.publish(
            &self.job_id,
            StatusUpdate::progress("Archiving transcoded files..."),
        );
        self.deps
            .packager
            .archive(job_dir)
            .await
            .map_err(|e| TranscodeError::packaging_failed(format!("Failed to archive files: {}", e)))
    }

    /// Fan out one subtask per target and fold their outcomes.
    ///
    /// Returns the fragments in dispatch order, or the terminal outcome when
    /// the ladder is incomplete.
    async fn transcode_all(
        &self,
        cancel: &CancellationToken,
        job_dir: PathBuf,
    ) -> Result<Vec<PlaylistFragment>, JobOutcome> {
        let runner = Arc::new(SubtaskRunner::new(
            self.job_id.clone(),
            self.source.clone(),
            job_dir,
            self.duration_secs,
            self.deps.encoding.clone(),
            Arc::clone(&self.deps.backend),
            Arc::clone(&self.deps.registry),
        ));

        let handles = self.targets.iter().map(|&resolution| {
            let runner = Arc::clone(&runner);
            let cancel = cancel.clone();
            tokio::spawn(
                async move { runner.transcode(cancel, resolution).await }
                    .in_current_span(),
            )
        });

        // Barrier: every subtask reports before anything is decided
        let results = join_all(handles).await;

        let mut fragments = Vec::with_capacity(self.targets.len());
        let mut failed = false;

        for (&resolution, result) in self.targets.iter().zip(results) {
            let outcome = result.unwrap_or_else(|e| {
                // A panicked subtask never reported for itself
                let reason = format!("subtask aborted: {}", e);
                self.logger.log_subtask_error(resolution, &reason);
                self.deps.registry.publish(
                    &self.job_id,
                    StatusUpdate::failed(format!("Transcoding {} failed: {}", resolution, reason))
                        .with_data(TaskData::for_resolution(resolution, 0.0)),
                );
                SubtaskOutcome::Failed(reason)
            });
            metrics::record_subtask(resolution.to_string(), outcome.as_str());

            // Failures were published by the subtask when they happened
            match outcome.into_result(resolution) {
                Ok(fragment) => fragments.push(fragment),
                Err(TranscodeError::SubtaskCancelled(_)) => {
                    self.logger
                        .log_subtask(resolution, "cancelled before completion");
                }
                Err(_) => failed = true,
            }
        }

        if cancel.is_cancelled() {
            return Err(self.cancelled());
        }
        if failed {
            return Err(self.fail(format!("Transcoding failed for {}", self.source.filename)));
        }
        if fragments.is_empty() {
            return Err(self.fail(format!(
                "No resolutions were produced for {}",
                self.source.filename
            )));
        }

        Ok(fragments)
    }

    fn fail(&self, reason: String) -> JobOutcome {
        self.logger.log_error(&reason);
        self.deps
            .registry
            .publish(&self.job_id, StatusUpdate::failed(reason.clone()));
        JobOutcome::Failed { reason }
    }

    fn cancelled(&self) -> JobOutcome {
        self.logger.log_warning("cancelled by request");
        self.deps.registry.publish(
            &self.job_id,
            StatusUpdate::cancelled(format!(
                "Transcoding cancelled for {}",
                self.source.filename
            )),
        );
        JobOutcome::Cancelled
    }
}
