//! Shared data models for the adaptive-bitrate transcoder.
//!
//! This crate provides Serde-serializable types for:
//! - Job identifiers and uploaded sources
//! - Status updates pushed to subscribers
//! - Resolution presets and target selection
//! - Per-resolution playlist fragments
//! - HLS encoding configuration

pub mod encoding;
pub mod job;
pub mod playlist;
pub mod resolution;
pub mod status;

// Re-export common types
pub use encoding::EncodingConfig;
pub use job::{JobId, TranscodeSource};
pub use playlist::PlaylistFragment;
pub use resolution::{target_resolutions, ParseResolutionError, Resolution, ResolutionPreset};
pub use status::{StatusKind, StatusUpdate, TaskData};
