//! FFmpeg progress parsing.
//!
//! Two formats are understood:
//! - the key/value blocks FFmpeg writes with `-progress pipe:2`, one key per
//!   line, each block terminated by `progress=continue|end`;
//! - the classic one-line stats (`frame=  120 fps= 30 ... time=00:00:04.00
//!   ... speed=1.5x`) written when `-stats` is active.
//!
//! Anything else on stderr is diagnostic output and is handed back to the
//! caller untouched.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

static FRAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"frame=\s*(\d+)").expect("valid frame regex"));
static TIME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"time=\s*(-?[\d:.]+)").expect("valid time regex"));
static SPEED_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"speed=\s*([\d.]+)x").expect("valid speed regex"));
static FPS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"fps=\s*([\d.]+)").expect("valid fps regex"));

/// Progress information from FFmpeg.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FfmpegProgress {
    /// Current frame number
    pub frame: u64,
    /// Current FPS
    pub fps: f64,
    /// Output time in milliseconds
    pub out_time_ms: i64,
    /// Output time as reported (HH:MM:SS.fraction)
    pub out_time: String,
    /// Encoding speed (e.g., 1.5 = 1.5x realtime)
    pub speed: f64,
    /// Whether encoding is complete
    pub is_complete: bool,
}

impl FfmpegProgress {
    /// Position reached in the source media, in seconds.
    pub fn elapsed_seconds(&self) -> f64 {
        self.out_time_ms as f64 / 1000.0
    }

    /// Calculate progress percentage given the total source duration.
    pub fn percentage(&self, total_duration_secs: f64) -> f64 {
        if total_duration_secs <= 0.0 {
            return 0.0;
        }
        (self.elapsed_seconds() / total_duration_secs * 100.0).clamp(0.0, 100.0)
    }

    /// Estimate time remaining in seconds.
    pub fn eta_seconds(&self, total_duration_secs: f64) -> Option<f64> {
        if self.speed <= 0.0 || self.out_time_ms <= 0 {
            return None;
        }

        let remaining = total_duration_secs - self.elapsed_seconds();
        if remaining <= 0.0 {
            return Some(0.0);
        }

        Some(remaining / self.speed)
    }
}

/// Callback type for progress updates.
pub type ProgressCallback = Box<dyn Fn(FfmpegProgress) + Send + Sync + 'static>;

/// Classification of a single stderr line.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedLine {
    /// A complete progress snapshot is available
    Progress(FfmpegProgress),
    /// A progress key was consumed; the snapshot is not complete yet
    Field,
    /// Diagnostic output, not progress
    Diagnostic,
}

/// Stateful parser for FFmpeg's stderr stream.
#[derive(Debug, Default)]
pub struct ProgressParser {
    current: FfmpegProgress,
}

impl ProgressParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one line of stderr.
    pub fn feed(&mut self, line: &str) -> ParsedLine {
        let line = line.trim();
        if line.is_empty() {
            return ParsedLine::Diagnostic;
        }

        if line.contains("frame=") && line.contains("time=") && line.contains(' ') {
            return match parse_stats_line(line) {
                Some(progress) => {
                    self.current = progress.clone();
                    ParsedLine::Progress(progress)
                }
                None => ParsedLine::Field,
            };
        }

        match line.split_once('=') {
            Some((key, value)) if is_progress_key(key) => self.apply(key, value.trim()),
            _ => ParsedLine::Diagnostic,
        }
    }

    fn apply(&mut self, key: &str, value: &str) -> ParsedLine {
        let current = &mut self.current;
        match key {
            // FFmpeg reports both keys in microseconds
            "out_time_us" | "out_time_ms" => {
                if let Ok(us) = value.parse::<i64>() {
                    if us >= 0 {
                        current.out_time_ms = us / 1000;
                    }
                }
            }
            "out_time" => {
                if let Some(secs) = parse_timemark(value) {
                    current.out_time = value.to_string();
                    current.out_time_ms = (secs * 1000.0) as i64;
                }
            }
            "frame" => {
                if let Ok(frame) = value.parse() {
                    current.frame = frame;
                }
            }
            "fps" => {
                if let Ok(fps) = value.parse() {
                    current.fps = fps;
                }
            }
            "speed" => {
                if let Some(speed) = value.strip_suffix('x').and_then(|s| s.trim().parse().ok()) {
                    current.speed = speed;
                }
            }
            "progress" => {
                if value == "end" {
                    current.is_complete = true;
                }
                return ParsedLine::Progress(current.clone());
            }
            _ => {}
        }
        ParsedLine::Field
    }
}

/// Keys emitted by `-progress`: lower-case identifiers without spaces.
fn is_progress_key(key: &str) -> bool {
    !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}

/// Parse a classic stats line into a snapshot.
///
/// Returns `None` when the time mark is missing or malformed (e.g.
/// `time=N/A` before the first frame is muxed).
pub fn parse_stats_line(line: &str) -> Option<FfmpegProgress> {
    let timemark = TIME_RE.captures(line)?.get(1)?.as_str();
    let secs = parse_timemark(timemark)?;

    let frame = FRAME_RE
        .captures(line)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
        .unwrap_or(0);
    let fps = FPS_RE
        .captures(line)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
        .unwrap_or(0.0);
    let speed = SPEED_RE
        .captures(line)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
        .unwrap_or(0.0);

    Some(FfmpegProgress {
        frame,
        fps,
        out_time_ms: (secs * 1000.0) as i64,
        out_time: timemark.to_string(),
        speed,
        is_complete: false,
    })
}

/// Parse an `HH:MM:SS.fraction` time mark into seconds.
pub fn parse_timemark(mark: &str) -> Option<f64> {
    let parts: Vec<&str> = mark.trim().split(':').collect();
    if parts.len() != 3 {
        return None;
    }
    let hours: f64 = parts[0].parse().ok()?;
    let minutes: f64 = parts[1].parse().ok()?;
    let seconds: f64 = parts[2].parse().ok()?;
    let total = hours * 3600.0 + minutes * 60.0 + seconds;
    (total >= 0.0).then_some(total)
}
