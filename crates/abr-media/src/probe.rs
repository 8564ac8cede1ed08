//! FFprobe video information.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;

use crate::command::check_ffprobe;
use crate::error::{MediaError, MediaResult};

/// Pixel dimensions of the first video stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

/// FFprobe JSON output format.
#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    #[serde(default)]
    format: Option<FfprobeFormat>,
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    #[serde(default)]
    codec_type: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
}

async fn run_ffprobe(args: &[&str], path: &Path) -> MediaResult<FfprobeOutput> {
    if !path.exists() {
        return Err(MediaError::FileNotFound(path.to_path_buf()));
    }

    let ffprobe = check_ffprobe()?;

    let output = Command::new(ffprobe)
        .args(args)
        .arg(path)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await?;

    if !output.status.success() {
        return Err(MediaError::ffprobe_failed(
            format!("FFprobe failed on {}", path.display()),
            Some(String::from_utf8_lossy(&output.stderr).to_string()),
        ));
    }

    Ok(serde_json::from_slice(&output.stdout)?)
}

/// Probe the dimensions of the first video stream.
///
/// Works on media files and on HLS playlists alike; zero width or height is
/// reported as [`MediaError::InvalidVideo`].
pub async fn probe_dimensions(path: impl AsRef<Path>) -> MediaResult<Dimensions> {
    let path = path.as_ref();
    let probe = run_ffprobe(
        &[
            "-v",
            "error",
            "-select_streams",
            "v:0",
            "-show_entries",
            "stream=width,height,codec_type",
            "-of",
            "json",
        ],
        path,
    )
    .await?;

    dimensions_of(&probe).ok_or_else(|| {
        MediaError::InvalidVideo(format!("could not detect resolution for {}", path.display()))
    })
}

/// Get media duration in seconds from the container format.
pub async fn get_duration(path: impl AsRef<Path>) -> MediaResult<f64> {
    let path = path.as_ref();
    let probe = run_ffprobe(
        &["-v", "error", "-show_entries", "format=duration", "-of", "json"],
        path,
    )
    .await?;

    duration_of(&probe).ok_or_else(|| {
        MediaError::InvalidVideo(format!("could not detect duration for {}", path.display()))
    })
}

fn duration_of(probe: &FfprobeOutput) -> Option<f64> {
    probe
        .format
        .as_ref()?
        .duration
        .as_deref()?
        .trim()
        .parse()
        .ok()
}

fn first_video_stream(probe: &FfprobeOutput) -> Option<&FfprobeStream> {
    probe
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video"))
}

fn dimensions_of(probe: &FfprobeOutput) -> Option<Dimensions> {
    let stream = first_video_stream(probe)?;
    match (stream.width, stream.height) {
        (Some(width), Some(height)) if width > 0 && height > 0 => {
            Some(Dimensions { width, height })
        }
        _ => None,
    }
}
