//! Job driver tests: admission, cancellation and cleanup.

mod common;

use std::sync::Arc;

use abr_media::FsPackager;
use abr_models::{JobId, Resolution, StatusKind};
use abr_status::StatusError;
use abr_worker::{JobDriver, JobOutcome, TranscodeError, WorkerConfig};
use tokio::sync::Semaphore;

use common::{drain, is_resolution_completed, wait_for, Behaviour, FakeBackend, Fixture};

fn driver(fx: &Fixture, backend: FakeBackend, max_jobs: usize) -> JobDriver {
    let config = WorkerConfig {
        output_dir: fx.output_dir(),
        max_concurrent_jobs: max_jobs,
        ..WorkerConfig::default()
    };
    JobDriver::new(
        &config,
        Arc::new(backend),
        Arc::new(FsPackager::new(fx.output_dir())),
        Arc::clone(&fx.registry),
    )
}

#[tokio::test]
async fn test_completed_job_is_removed_from_registry() {
    let fx = Fixture::new();
    let gate = Arc::new(Semaphore::new(0));
    let backend =
        FakeBackend::new(1280, 720).with(Resolution::P360, Behaviour::Gated(Arc::clone(&gate)));
    let driver = driver(&fx, backend, 2);
    let source = fx.source("clip.mp4");
    let source_path = source.path.clone();

    let job = driver.submit(JobId::from_string("job-ok"), source).await.unwrap();
    let mut sub = driver.subscribe(&job.job_id).unwrap();
    gate.add_permits(1);

    let updates = drain(&mut sub).await;
    let last = updates.last().unwrap();
    assert_eq!(last.kind, StatusKind::Completed);
    assert!(last.archive.is_some());

    assert!(matches!(job.handle.await.unwrap(), JobOutcome::Completed { .. }));
    assert!(!fx.registry.is_active(&job.job_id));
    assert!(!source_path.exists());
    assert!(fx.output_dir().join("job-ok.zip").exists());
    assert!(matches!(
        driver.subscribe(&job.job_id),
        Err(StatusError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_unsupported_source_hands_out_no_job() {
    let fx = Fixture::new();
    let driver = driver(&fx, FakeBackend::new(426, 240), 2);
    let source = fx.source("tiny.mp4");
    let source_path = source.path.clone();

    let err = driver.start_job(source).await.unwrap_err();
    assert!(matches!(err, TranscodeError::ResolutionUnsupported(_)));
    assert!(err.is_client_error());
    assert!(fx.registry.active_jobs().is_empty());
    assert!(!source_path.exists());
}

#[tokio::test]
async fn test_cancel_running_job_cleans_output() {
    let fx = Fixture::new();
    let backend = FakeBackend::new(854, 480).with(Resolution::P360, Behaviour::WaitForCancel);
    let driver = driver(&fx, backend, 2);

    let job = driver
        .submit(JobId::from_string("job-cancel"), fx.source("clip.mp4"))
        .await
        .unwrap();
    let mut sub = driver.subscribe(&job.job_id).unwrap();

    wait_for(&mut sub, is_resolution_completed).await;
    driver.cancel_job(&job.job_id).unwrap();
    // Repeated requests are harmless
    driver.cancel_job(&job.job_id).unwrap();

    let updates = drain(&mut sub).await;
    assert_eq!(updates.last().unwrap().kind, StatusKind::Cancelled);
    assert_eq!(job.handle.await.unwrap(), JobOutcome::Cancelled);

    assert!(!fx.output_dir().join("job-cancel").exists());
    assert!(!fx.output_dir().join("job-cancel.zip").exists());
    assert_eq!(
        driver.cancel_job(&job.job_id),
        Err(StatusError::NotFound(job.job_id.clone()))
    );
}

#[tokio::test]
async fn test_queued_job_can_be_cancelled() {
    let fx = Fixture::new();
    let backend = FakeBackend::new(640, 360).with(Resolution::P360, Behaviour::WaitForCancel);
    let driver = driver(&fx, backend, 1);

    let running = driver
        .submit(JobId::from_string("job-a"), fx.source("a.mp4"))
        .await
        .unwrap();
    let mut running_sub = driver.subscribe(&running.job_id).unwrap();
    wait_for(&mut running_sub, |u| u.resolution() == Some("360P")).await;

    // Only one slot, so the second job waits in the queue
    let queued = driver
        .submit(JobId::from_string("job-b"), fx.source("b.mp4"))
        .await
        .unwrap();
    assert_eq!(
        fx.registry.last_status(&queued.job_id).unwrap().kind,
        StatusKind::Started
    );

    driver.cancel_job(&queued.job_id).unwrap();
    assert_eq!(queued.handle.await.unwrap(), JobOutcome::Cancelled);
    assert!(!fx.output_dir().join("job-b").exists());

    driver.cancel_job(&running.job_id).unwrap();
    assert_eq!(running.handle.await.unwrap(), JobOutcome::Cancelled);
    assert_eq!(driver.active_jobs(), 0);
}

#[tokio::test]
async fn test_unsubscribe_closes_subscription() {
    let fx = Fixture::new();
    let backend = FakeBackend::new(640, 360).with(Resolution::P360, Behaviour::WaitForCancel);
    let driver = driver(&fx, backend, 1);

    let job = driver
        .submit(JobId::from_string("job-u"), fx.source("clip.mp4"))
        .await
        .unwrap();
    let mut sub = driver.subscribe(&job.job_id).unwrap();
    driver.unsubscribe(&job.job_id, sub.id);

    // Whatever was queued drains, then the mailbox reports closed
    drain(&mut sub).await;
    assert_eq!(fx.registry.subscriber_count(&job.job_id), 0);

    driver.cancel_job(&job.job_id).unwrap();
    assert_eq!(job.handle.await.unwrap(), JobOutcome::Cancelled);
}
