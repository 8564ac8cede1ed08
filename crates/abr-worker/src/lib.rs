//! Adaptive-bitrate transcoding worker.
//!
//! This crate provides:
//! - Subtask runner encoding one HLS rendition with live progress
//! - Job pipeline fanning a source out into the resolution ladder
//! - Master playlist assembly and archive packaging
//! - Job driver with bounded job concurrency and cleanup

pub mod config;
pub mod driver;
pub mod error;
pub mod logging;
pub mod manifest;
pub mod metrics;
pub mod pipeline;
pub mod subtask;

pub use config::WorkerConfig;
pub use driver::{JobDriver, JobHandle};
pub use error::{TranscodeError, TranscodeResult};
pub use logging::JobLogger;
pub use manifest::{build_master_playlist, write_master_playlist, MASTER_PLAYLIST};
pub use pipeline::{JobOutcome, JobPipeline, PipelineDeps, COMPLETED_MESSAGE};
pub use subtask::{SubtaskOutcome, SubtaskPaths, SubtaskRunner};
