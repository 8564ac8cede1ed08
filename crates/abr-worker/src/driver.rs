//! Job driver: admission, scheduling and cleanup of jobs.

use std::io::ErrorKind;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use abr_media::{FfmpegBackend, FsPackager, MediaBackend, Packager};
use abr_models::{JobId, StatusUpdate, TranscodeSource};
use abr_status::{StatusRegistry, StatusResult, Subscription};
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::WorkerConfig;
use crate::error::TranscodeResult;
use crate::metrics;
use crate::pipeline::{JobOutcome, JobPipeline, PipelineDeps};

/// A job accepted by the driver.
#[derive(Debug)]
pub struct JobHandle {
    pub job_id: JobId,
    /// Resolves once the job reached its terminal outcome and was removed
    /// from the registry.
    pub handle: JoinHandle<JobOutcome>,
}

/// Accepts jobs and runs them on the tokio runtime.
///
/// Owns the uploaded source from the moment it is submitted: the file is
/// deleted when the job ends or is rejected.
#[derive(Clone)]
pub struct JobDriver {
    deps: PipelineDeps,
    slots: Arc<Semaphore>,
    active: Arc<AtomicUsize>,
}

impl JobDriver {
    pub fn new(
        config: &WorkerConfig,
        backend: Arc<dyn MediaBackend>,
        packager: Arc<dyn Packager>,
        registry: Arc<StatusRegistry>,
    ) -> Self {
        Self {
            deps: PipelineDeps {
                backend,
                packager,
                registry,
                encoding: config.encoding.clone(),
            },
            slots: Arc::new(Semaphore::new(config.max_concurrent_jobs.max(1))),
            active: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Driver backed by the FFmpeg CLI and the local filesystem.
    pub fn from_config(config: &WorkerConfig) -> Self {
        let mut backend = FfmpegBackend::new();
        if let Some(timeout) = config.encode_timeout {
            backend = backend.with_timeout(timeout.as_secs());
        }

        Self::new(
            config,
            Arc::new(backend),
            Arc::new(FsPackager::new(&config.output_dir)),
            Arc::new(StatusRegistry::new(config.registry_config())),
        )
    }

    pub fn registry(&self) -> &Arc<StatusRegistry> {
        &self.deps.registry
    }

    /// Number of jobs currently transcoding.
    pub fn active_jobs(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    /// Start a job under a fresh id.
    pub async fn start_job(&self, source: TranscodeSource) -> TranscodeResult<JobId> {
        let handle = self.submit(JobId::new(), source).await?;
        Ok(handle.job_id)
    }

    /// Start a job under a caller-chosen id.
    ///
    /// The source is probed before anything is registered; on error the
    /// registry holds no entry for `job_id` and the source file is removed.
    pub async fn submit(
        &self,
        job_id: JobId,
        source: TranscodeSource,
    ) -> TranscodeResult<JobHandle> {
        let pipeline =
            match JobPipeline::prepare(job_id.clone(), source.clone(), self.deps.clone()).await {
                Ok(pipeline) => pipeline,
                Err(e) => {
                    info!(job_id = %job_id, "Rejected {}: {}", source.filename, e);
                    remove_source(&job_id, &source.path).await;
                    return Err(e);
                }
            };

        let token = CancellationToken::new();
        let registry = &self.deps.registry;
        registry.bind_cancellation(&job_id, token.clone());
        registry.publish(
            &job_id,
            StatusUpdate::started(format!("{} queued for transcoding", source.filename)),
        );
        metrics::record_job_started();

        let driver = self.clone();
        let id = job_id.clone();
        let handle = tokio::spawn(async move { driver.drive(id, source, pipeline, token).await });

        Ok(JobHandle { job_id, handle })
    }

    async fn drive(
        self,
        job_id: JobId,
        source: TranscodeSource,
        pipeline: JobPipeline,
        token: CancellationToken,
    ) -> JobOutcome {
        let started = Instant::now();
        let job_dir = pipeline.job_dir();

        let outcome = tokio::select! {
            permit = Arc::clone(&self.slots).acquire_owned() => match permit {
                Ok(_permit) => {
                    self.track_active(1);
                    let run_token = token.clone();
                    // A panicking pipeline still ends in cleanup
                    let outcome = tokio::spawn(async move { pipeline.run(run_token).await })
                        .await
                        .unwrap_or_else(|e| {
                            let reason = format!("pipeline aborted: {}", e);
                            self.deps
                                .registry
                                .publish(&job_id, StatusUpdate::failed(reason.clone()));
                            JobOutcome::Failed { reason }
                        });
                    self.track_active(-1);
                    outcome
                }
                Err(e) => {
                    let reason = format!("job slots unavailable: {}", e);
                    self.deps
                        .registry
                        .publish(&job_id, StatusUpdate::failed(reason.clone()));
                    JobOutcome::Failed { reason }
                }
            },
            _ = token.cancelled() => {
                self.deps.registry.publish(
                    &job_id,
                    StatusUpdate::cancelled(format!("Transcoding cancelled for {}", source.filename)),
                );
                JobOutcome::Cancelled
            }
        };

        if outcome == JobOutcome::Cancelled {
            if let Err(e) = self.deps.packager.remove_dir(&job_dir).await {
                warn!(job_id = %job_id, "Failed to remove output of cancelled job: {}", e);
            }
        }

        remove_source(&job_id, &source.path).await;

        metrics::record_job_finished(outcome.as_str(), started.elapsed().as_secs_f64());
        info!(
            job_id = %job_id,
            outcome = outcome.as_str(),
            "Job finished in {:.1}s",
            started.elapsed().as_secs_f64()
        );

        self.deps.registry.remove(&job_id);
        outcome
    }

    fn track_active(&self, delta: isize) {
        let count = if delta > 0 {
            self.active.fetch_add(1, Ordering::SeqCst) + 1
        } else {
            self.active.fetch_sub(1, Ordering::SeqCst) - 1
        };
        metrics::set_active_jobs(count);
    }

    pub fn subscribe(&self, job_id: &JobId) -> StatusResult<Subscription> {
        self.deps.registry.subscribe(job_id)
    }

    pub fn unsubscribe(&self, job_id: &JobId, subscription_id: u64) {
        self.deps.registry.unsubscribe(job_id, subscription_id)
    }

    pub fn cancel_job(&self, job_id: &JobId) -> StatusResult<()> {
        self.deps.registry.cancel(job_id)
    }
}

async fn remove_source(job_id: &JobId, path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => debug!(job_id = %job_id, "Removed source {}", path.display()),
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => warn!(job_id = %job_id, "Failed to remove source {}: {}", path.display(), e),
    }
}
