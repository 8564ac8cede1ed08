//! Test doubles for the media backend and packager.

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use abr_media::{
    Dimensions, FfmpegCommand, FfmpegProgress, FsPackager, MediaBackend, MediaError, MediaResult,
    Packager, ProgressCallback,
};
use abr_models::{EncodingConfig, JobId, Resolution, StatusKind, StatusUpdate, TranscodeSource};
use abr_status::{RegistryConfig, StatusRegistry, Subscription};
use abr_worker::PipelineDeps;
use async_trait::async_trait;
use parking_lot::Mutex;
use tempfile::TempDir;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

/// What the fake encoder does for one resolution.
#[derive(Debug, Clone)]
pub enum Behaviour {
    Succeed,
    Fail(String),
    /// Block until the job token fires
    WaitForCancel,
    /// Succeed once a permit is released
    Gated(Arc<Semaphore>),
    Panic,
}

pub struct FakeBackend {
    source: Dimensions,
    duration: f64,
    behaviours: Mutex<HashMap<Resolution, Behaviour>>,
    broken_probe: Mutex<Option<Resolution>>,
}

impl FakeBackend {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            source: Dimensions { width, height },
            duration: 10.0,
            behaviours: Mutex::new(HashMap::new()),
            broken_probe: Mutex::new(None),
        }
    }

    pub fn with(self, resolution: Resolution, behaviour: Behaviour) -> Self {
        self.behaviours.lock().insert(resolution, behaviour);
        self
    }

    pub fn with_broken_probe(self, resolution: Resolution) -> Self {
        *self.broken_probe.lock() = Some(resolution);
        self
    }

    fn behaviour(&self, resolution: Resolution) -> Behaviour {
        self.behaviours
            .lock()
            .get(&resolution)
            .cloned()
            .unwrap_or(Behaviour::Succeed)
    }
}

/// Resolution a command or playlist belongs to, from its `<RES>/` directory.
fn resolution_of(path: &Path) -> Option<Resolution> {
    path.parent()?.file_name()?.to_str()?.parse().ok()
}

#[async_trait]
impl MediaBackend for FakeBackend {
    async fn probe_dimensions(&self, path: &Path) -> MediaResult<Dimensions> {
        match resolution_of(path) {
            Some(resolution) => {
                if *self.broken_probe.lock() == Some(resolution) {
                    return Err(MediaError::ffprobe_failed("FFprobe failed", None));
                }
                let preset = resolution.preset();
                Ok(Dimensions {
                    width: preset.width,
                    height: preset.height,
                })
            }
            None => Ok(self.source),
        }
    }

    async fn probe_duration(&self, _path: &Path) -> MediaResult<f64> {
        Ok(self.duration)
    }

    async fn encode(
        &self,
        cmd: &FfmpegCommand,
        cancel: &CancellationToken,
        on_progress: ProgressCallback,
    ) -> MediaResult<()> {
        let resolution = resolution_of(cmd.output())
            .ok_or_else(|| MediaError::internal("unexpected output path"))?;

        match self.behaviour(resolution) {
            Behaviour::Succeed => succeed(cmd, on_progress).await,
            Behaviour::Gated(gate) => {
                let _permit = gate
                    .acquire()
                    .await
                    .map_err(|_| MediaError::internal("gate closed"))?;
                succeed(cmd, on_progress).await
            }
            Behaviour::Fail(stderr) => Err(MediaError::ffmpeg_failed(
                "FFmpeg exited with non-zero status",
                Some(stderr),
                Some(1),
            )),
            Behaviour::WaitForCancel => {
                cancel.cancelled().await;
                Err(MediaError::Cancelled)
            }
            Behaviour::Panic => panic!("encoder crashed for {}", resolution),
        }
    }
}

async fn succeed(cmd: &FfmpegCommand, on_progress: ProgressCallback) -> MediaResult<()> {
    on_progress(FfmpegProgress {
        frame: 120,
        out_time: "00:00:05.00".to_string(),
        out_time_ms: 5_000,
        speed: 2.0,
        ..Default::default()
    });
    tokio::fs::write(cmd.output(), "#EXTM3U\n#EXT-X-ENDLIST\n").await?;
    Ok(())
}

/// Packager whose archive step always fails.
pub struct BrokenArchivePackager(pub FsPackager);

#[async_trait]
impl Packager for BrokenArchivePackager {
    fn job_dir(&self, job_id: &JobId) -> PathBuf {
        self.0.job_dir(job_id)
    }

    async fn create_job_dir(&self, job_id: &JobId) -> MediaResult<PathBuf> {
        self.0.create_job_dir(job_id).await
    }

    async fn archive(&self, _dir: &Path) -> MediaResult<PathBuf> {
        Err(MediaError::Io(std::io::Error::new(
            std::io::ErrorKind::Other,
            "disk full",
        )))
    }

    async fn remove_dir(&self, dir: &Path) -> MediaResult<()> {
        self.0.remove_dir(dir).await
    }
}

pub struct Fixture {
    pub tmp: TempDir,
    pub registry: Arc<StatusRegistry>,
}

impl Fixture {
    pub fn new() -> Self {
        Self {
            tmp: TempDir::new().unwrap(),
            // Large mailboxes so tests observe every update
            registry: Arc::new(StatusRegistry::new(RegistryConfig {
                subscriber_capacity: 1024,
            })),
        }
    }

    pub fn output_dir(&self) -> PathBuf {
        self.tmp.path().join("output")
    }

    pub fn deps(&self, backend: FakeBackend) -> PipelineDeps {
        self.deps_with(backend, Arc::new(FsPackager::new(self.output_dir())))
    }

    pub fn deps_with(&self, backend: FakeBackend, packager: Arc<dyn Packager>) -> PipelineDeps {
        PipelineDeps {
            backend: Arc::new(backend),
            packager,
            registry: Arc::clone(&self.registry),
            encoding: EncodingConfig::default(),
        }
    }

    /// Write a dummy upload and describe it.
    pub fn source(&self, filename: &str) -> TranscodeSource {
        let uploads = self.tmp.path().join("uploads");
        std::fs::create_dir_all(&uploads).unwrap();
        let path = uploads.join(filename);
        std::fs::write(&path, b"not really a video").unwrap();
        TranscodeSource::new(path, filename)
    }
}

/// Receive updates until one matches, failing the test after a timeout.
pub async fn wait_for<F>(sub: &mut Subscription, mut pred: F) -> StatusUpdate
where
    F: FnMut(&StatusUpdate) -> bool,
{
    loop {
        let update = tokio::time::timeout(Duration::from_secs(5), sub.recv())
            .await
            .expect("timed out waiting for update")
            .expect("subscription closed");
        if pred(&update) {
            return update;
        }
    }
}

/// Drain a subscription until the registry closes it.
pub async fn drain(sub: &mut Subscription) -> Vec<StatusUpdate> {
    let mut updates = Vec::new();
    while let Some(update) = tokio::time::timeout(Duration::from_secs(5), sub.recv())
        .await
        .expect("timed out waiting for close")
    {
        updates.push(update);
    }
    updates
}

pub fn is_resolution_completed(update: &StatusUpdate) -> bool {
    update.kind == StatusKind::Completed && update.data.is_some()
}
