//! HLS encoding configuration.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::ResolutionPreset;

/// Default video codec (H.264)
pub const DEFAULT_VIDEO_CODEC: &str = "libx264";
/// Default audio codec
pub const DEFAULT_AUDIO_CODEC: &str = "aac";
/// Default encoding preset
pub const DEFAULT_PRESET: &str = "fast";
/// Default CRF for the ladder
pub const DEFAULT_CRF: u8 = 28;
/// Default audio bitrate
pub const DEFAULT_AUDIO_BITRATE: &str = "128k";
/// Keyframe interval in frames; segments only cut on keyframes
pub const DEFAULT_GOP_SIZE: u32 = 48;
/// Target HLS segment duration in seconds
pub const DEFAULT_SEGMENT_SECS: u32 = 4;

/// Encoder settings shared by every rung of the ladder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct EncodingConfig {
    /// Video codec (e.g., "libx264")
    #[serde(default = "default_video_codec")]
    pub codec: String,

    /// Encoding preset (e.g., "fast", "medium")
    #[serde(default = "default_preset")]
    pub preset: String,

    /// Constant Rate Factor (0-51, lower is better)
    #[serde(default = "default_crf")]
    pub crf: u8,

    /// Keyframe interval (frames)
    #[serde(default = "default_gop_size")]
    pub gop_size: u32,

    /// HLS segment length (seconds)
    #[serde(default = "default_segment_secs")]
    pub segment_secs: u32,

    /// Audio codec
    #[serde(default = "default_audio_codec")]
    pub audio_codec: String,

    /// Audio bitrate
    #[serde(default = "default_audio_bitrate")]
    pub audio_bitrate: String,
}

fn default_video_codec() -> String {
    DEFAULT_VIDEO_CODEC.to_string()
}
fn default_preset() -> String {
    DEFAULT_PRESET.to_string()
}
fn default_crf() -> u8 {
    DEFAULT_CRF
}
fn default_gop_size() -> u32 {
    DEFAULT_GOP_SIZE
}
fn default_segment_secs() -> u32 {
    DEFAULT_SEGMENT_SECS
}
fn default_audio_codec() -> String {
    DEFAULT_AUDIO_CODEC.to_string()
}
fn default_audio_bitrate() -> String {
    DEFAULT_AUDIO_BITRATE.to_string()
}

impl Default for EncodingConfig {
    fn default() -> Self {
        Self {
            codec: default_video_codec(),
            preset: default_preset(),
            crf: DEFAULT_CRF,
            gop_size: DEFAULT_GOP_SIZE,
            segment_secs: DEFAULT_SEGMENT_SECS,
            audio_codec: default_audio_codec(),
            audio_bitrate: default_audio_bitrate(),
        }
    }
}

impl EncodingConfig {
    /// Create a new encoding configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a new config with updated CRF.
    pub fn with_crf(mut self, crf: u8) -> Self {
        self.crf = crf.min(51);
        self
    }

    /// Returns a new config with updated preset.
    pub fn with_preset(mut self, preset: impl Into<String>) -> Self {
        self.preset = preset.into();
        self
    }

    /// Returns a new config with updated segment length.
    pub fn with_segment_secs(mut self, secs: u32) -> Self {
        self.segment_secs = secs.max(1);
        self
    }

    /// FFmpeg output arguments for one rung, excluding the segment pattern
    /// and the playlist path.
    pub fn to_ffmpeg_args(&self, preset: &ResolutionPreset) -> Vec<String> {
        vec![
            "-preset".to_string(),
            self.preset.clone(),
            "-crf".to_string(),
            self.crf.to_string(),
            "-sc_threshold".to_string(),
            "0".to_string(),
            "-g".to_string(),
            self.gop_size.to_string(),
            "-keyint_min".to_string(),
            self.gop_size.to_string(),
            "-hls_time".to_string(),
            self.segment_secs.to_string(),
            "-hls_playlist_type".to_string(),
            "vod".to_string(),
            "-vf".to_string(),
            format!("scale=-2:{}", preset.height),
            "-b:v".to_string(),
            format!("{}k", preset.bitrate_kbps),
            "-c:v".to_string(),
            self.codec.clone(),
            "-c:a".to_string(),
            self.audio_codec.clone(),
            "-b:a".to_string(),
            self.audio_bitrate.clone(),
        ]
    }
}
