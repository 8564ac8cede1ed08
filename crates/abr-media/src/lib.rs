#![deny(unreachable_patterns)]
//! FFmpeg CLI wrapper for adaptive-bitrate packaging.
//!
//! This crate provides:
//! - Type-safe FFmpeg command building
//! - Progress parsing from `-progress pipe:2` and classic stats lines
//! - Cancellation support via `tokio_util` cancellation tokens
//! - FFprobe resolution and duration probing
//! - Output directory management and zip archiving

pub mod backend;
pub mod command;
pub mod error;
pub mod package;
pub mod probe;
pub mod progress;

pub use backend::{FfmpegBackend, MediaBackend};
pub use command::{check_ffmpeg, check_ffprobe, FfmpegCommand, FfmpegRunner};
pub use error::{MediaError, MediaResult};
pub use package::{FsPackager, Packager};
pub use probe::{get_duration, probe_dimensions, Dimensions};
pub use progress::{FfmpegProgress, ProgressCallback, ProgressParser};
