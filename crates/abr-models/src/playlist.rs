//! Per-resolution playlist fragments.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::Resolution;

/// Output of one successful resolution subtask.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaylistFragment {
    /// Tier that was requested
    pub resolution: Resolution,
    /// Width actually encoded, as probed from the playlist
    pub detected_width: u32,
    /// Height actually encoded, as probed from the playlist
    pub detected_height: u32,
    /// Target bitrate in kbps
    pub bitrate_kbps: u32,
    /// Playlist file name, e.g. "clip_720Pp.m3u8"
    pub playlist_filename: String,
    /// Path relative to the job directory, referenced from the master playlist
    pub path_from_main: String,
    /// Absolute path of the playlist
    pub playlist_path: PathBuf,
}

impl PlaylistFragment {
    /// Bandwidth attribute for the master playlist, in bits per second.
    pub fn bandwidth(&self) -> u64 {
        u64::from(self.bitrate_kbps) * 1000
    }
}
