//! Job pipeline tests against a fake encoder.

mod common;

use std::io::Read;
use std::sync::Arc;

use abr_media::FsPackager;
use abr_models::{JobId, Resolution, StatusKind, StatusUpdate};
use abr_worker::{JobOutcome, JobPipeline, TranscodeError, COMPLETED_MESSAGE};
use common::{
    is_resolution_completed, wait_for, BrokenArchivePackager, Behaviour, FakeBackend, Fixture,
};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

fn job() -> JobId {
    JobId::from_string("job-1")
}

#[tokio::test]
async fn test_successful_job_is_archived() {
    let fx = Fixture::new();
    let pipeline = JobPipeline::prepare(job(), fx.source("clip.mp4"), fx.deps(FakeBackend::new(1280, 720)))
        .await
        .unwrap();
    assert_eq!(
        pipeline.targets(),
        &[Resolution::P720, Resolution::P480, Resolution::P360]
    );

    let outcome = pipeline.run(CancellationToken::new()).await;

    let archive = fx.output_dir().join("job-1.zip");
    assert_eq!(outcome, JobOutcome::Completed { archive: archive.clone() });
    assert!(archive.exists());
    assert!(!fx.output_dir().join("job-1").exists());

    let last = fx.registry.last_status(&job()).unwrap();
    assert_eq!(last.kind, StatusKind::Completed);
    assert_eq!(last.message, COMPLETED_MESSAGE);
    assert_eq!(last.archive.as_deref(), Some(archive.to_string_lossy().as_ref()));

    let mut zip = zip::ZipArchive::new(std::fs::File::open(&archive).unwrap()).unwrap();
    let mut manifest = String::new();
    zip.by_name("main.m3u8")
        .unwrap()
        .read_to_string(&mut manifest)
        .unwrap();
    assert_eq!(
        manifest,
        "#EXTM3U\n\
#EXT-X-VERSION:3\n\
#EXT-X-STREAM-INF:BANDWIDTH=4000000,RESOLUTION=1280x720\n\
720P/clip_720Pp.m3u8\n\
#EXT-X-STREAM-INF:BANDWIDTH=2000000,RESOLUTION=854x480\n\
480P/clip_480Pp.m3u8\n\
#EXT-X-STREAM-INF:BANDWIDTH=1000000,RESOLUTION=640x360\n\
360P/clip_360Pp.m3u8"
    );
    assert!(zip.by_name("480P/clip_480Pp.m3u8").is_ok());
}

#[tokio::test]
async fn test_manifest_follows_dispatch_order_not_completion_order() {
    let fx = Fixture::new();
    fx.registry.publish(&job(), StatusUpdate::started("queued"));
    let mut sub = fx.registry.subscribe(&job()).unwrap();

    let gate = Arc::new(Semaphore::new(0));
    let backend =
        FakeBackend::new(1920, 1080).with(Resolution::P1080, Behaviour::Gated(Arc::clone(&gate)));
    let pipeline = JobPipeline::prepare(job(), fx.source("clip.mp4"), fx.deps(backend))
        .await
        .unwrap();
    let handle = tokio::spawn(async move { pipeline.run(CancellationToken::new()).await });

    // The tallest rung finishes last
    let mut finished = Vec::new();
    for _ in 0..3 {
        let update = wait_for(&mut sub, is_resolution_completed).await;
        finished.push(update.resolution().unwrap().to_string());
    }
    assert!(!finished.contains(&"1080P".to_string()));
    gate.add_permits(1);

    let archive = fx.output_dir().join("job-1.zip");
    assert_eq!(
        handle.await.unwrap(),
        JobOutcome::Completed { archive: archive.clone() }
    );

    let mut zip = zip::ZipArchive::new(std::fs::File::open(&archive).unwrap()).unwrap();
    let mut manifest = String::new();
    zip.by_name("main.m3u8")
        .unwrap()
        .read_to_string(&mut manifest)
        .unwrap();
    let variants: Vec<&str> = manifest
        .lines()
        .filter(|line| !line.starts_with('#'))
        .collect();
    assert_eq!(
        variants,
        [
            "1080P/clip_1080Pp.m3u8",
            "720P/clip_720Pp.m3u8",
            "480P/clip_480Pp.m3u8",
            "360P/clip_360Pp.m3u8",
        ]
    );
}

#[tokio::test]
async fn test_progress_is_tagged_per_resolution() {
    let fx = Fixture::new();
    fx.registry.publish(&job(), StatusUpdate::started("queued"));
    let mut sub = fx.registry.subscribe(&job()).unwrap();

    let pipeline = JobPipeline::prepare(job(), fx.source("clip.mp4"), fx.deps(FakeBackend::new(854, 480)))
        .await
        .unwrap();
    pipeline.run(CancellationToken::new()).await;

    let progress = wait_for(&mut sub, |u| {
        u.kind == StatusKind::Progress && u.resolution() == Some("360P")
    })
    .await;
    let data = progress.data.unwrap();
    assert_eq!(data.frame, "120");
    assert_eq!(data.timestamp, 5);
    assert!((data.progress - 50.0).abs() < 0.01);
    assert_eq!(
        progress.message,
        "Transcoding 360P: frame 120, time 00:00:05.00, speed 2x"
    );
}

#[tokio::test]
async fn test_one_failed_resolution_fails_the_job() {
    let fx = Fixture::new();
    fx.registry.publish(&job(), StatusUpdate::started("queued"));
    let mut sub = fx.registry.subscribe(&job()).unwrap();

    let backend = FakeBackend::new(1920, 1080).with(
        Resolution::P720,
        Behaviour::Fail("Conversion failed!".to_string()),
    );
    let pipeline = JobPipeline::prepare(job(), fx.source("clip.mp4"), fx.deps(backend))
        .await
        .unwrap();

    let outcome = pipeline.run(CancellationToken::new()).await;
    assert!(matches!(outcome, JobOutcome::Failed { .. }));

    // Siblings still ran to completion
    for tag in ["1080P", "480P", "360P"] {
        assert!(fx
            .output_dir()
            .join("job-1")
            .join(tag)
            .join(format!("clip_{}p.m3u8", tag))
            .exists());
    }
    assert!(!fx.output_dir().join("job-1").join("main.m3u8").exists());
    assert!(!fx.output_dir().join("job-1.zip").exists());

    let failed = wait_for(&mut sub, |u| u.message.starts_with("Transcoding 720P failed")).await;
    assert_eq!(failed.kind, StatusKind::Failed);
    assert_eq!(failed.resolution(), Some("720P"));
    assert!(failed.message.contains("Conversion failed!"));

    let last = fx.registry.last_status(&job()).unwrap();
    assert_eq!(last.kind, StatusKind::Failed);
    assert!(last.is_job_terminal());
}

#[tokio::test]
async fn test_cancellation_beats_partial_success() {
    let fx = Fixture::new();
    fx.registry.publish(&job(), StatusUpdate::started("queued"));
    let mut sub = fx.registry.subscribe(&job()).unwrap();

    let backend = FakeBackend::new(1280, 720).with(Resolution::P360, Behaviour::WaitForCancel);
    let pipeline = JobPipeline::prepare(job(), fx.source("clip.mp4"), fx.deps(backend))
        .await
        .unwrap();

    let token = CancellationToken::new();
    let run_token = token.clone();
    let handle = tokio::spawn(async move { pipeline.run(run_token).await });

    // Two of three resolutions finish before the cancel arrives
    wait_for(&mut sub, is_resolution_completed).await;
    wait_for(&mut sub, is_resolution_completed).await;
    token.cancel();

    assert_eq!(handle.await.unwrap(), JobOutcome::Cancelled);

    let last = fx.registry.last_status(&job()).unwrap();
    assert_eq!(last.kind, StatusKind::Cancelled);
    assert!(!fx.output_dir().join("job-1").join("main.m3u8").exists());
    assert!(!fx.output_dir().join("job-1.zip").exists());
}

#[tokio::test]
async fn test_already_cancelled_job_spawns_nothing() {
    let fx = Fixture::new();
    let pipeline = JobPipeline::prepare(job(), fx.source("clip.mp4"), fx.deps(FakeBackend::new(640, 360)))
        .await
        .unwrap();

    let token = CancellationToken::new();
    token.cancel();
    assert_eq!(pipeline.run(token).await, JobOutcome::Cancelled);
    assert!(!fx.output_dir().join("job-1").join("360P").exists());
}

#[tokio::test]
async fn test_panicking_subtask_counts_as_failure() {
    let fx = Fixture::new();
    let backend = FakeBackend::new(854, 480).with(Resolution::P480, Behaviour::Panic);
    let pipeline = JobPipeline::prepare(job(), fx.source("clip.mp4"), fx.deps(backend))
        .await
        .unwrap();

    fx.registry.publish(&job(), StatusUpdate::started("queued"));
    let mut sub = fx.registry.subscribe(&job()).unwrap();

    let outcome = pipeline.run(CancellationToken::new()).await;
    assert!(matches!(outcome, JobOutcome::Failed { .. }));

    // The pipeline reports the crashed rung on its behalf
    let failed = wait_for(&mut sub, |u| u.message.starts_with("Transcoding 480P failed")).await;
    assert!(failed.message.contains("subtask aborted"));
}

#[tokio::test]
async fn test_playlist_probe_failure_fails_the_job() {
    let fx = Fixture::new();
    let backend = FakeBackend::new(854, 480).with_broken_probe(Resolution::P360);
    let pipeline = JobPipeline::prepare(job(), fx.source("clip.mp4"), fx.deps(backend))
        .await
        .unwrap();

    let outcome = pipeline.run(CancellationToken::new()).await;
    assert!(matches!(outcome, JobOutcome::Failed { .. }));
}

#[tokio::test]
async fn test_archive_failure_is_terminal() {
    let fx = Fixture::new();
    let packager = Arc::new(BrokenArchivePackager(FsPackager::new(fx.output_dir())));
    let pipeline = JobPipeline::prepare(
        job(),
        fx.source("clip.mp4"),
        fx.deps_with(FakeBackend::new(640, 360), packager),
    )
    .await
    .unwrap();

    match pipeline.run(CancellationToken::new()).await {
        JobOutcome::Failed { reason } => assert!(reason.starts_with("Failed to archive files")),
        other => panic!("expected failure, got {:?}", other),
    }

    // The manifest was written before packaging failed
    assert!(fx.output_dir().join("job-1").join("main.m3u8").exists());
    assert_eq!(
        fx.registry.last_status(&job()).unwrap().kind,
        StatusKind::Failed
    );
}

#[tokio::test]
async fn test_unsupported_source_is_rejected() {
    let fx = Fixture::new();
    let result =
        JobPipeline::prepare(job(), fx.source("tiny.mp4"), fx.deps(FakeBackend::new(320, 240))).await;

    match result {
        Err(TranscodeError::ResolutionUnsupported(dims)) => assert_eq!(dims, "320x240"),
        Err(other) => panic!("unexpected error {:?}", other),
        Ok(_) => panic!("240p source must be rejected"),
    }
    assert!(fx.registry.last_status(&job()).is_none());
}
