//! Resolution tiers and the static preset ladder.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// A rung of the output ladder, identified by its pixel height.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema,
)]
#[serde(into = "String", try_from = "String")]
pub enum Resolution {
    P360,
    P480,
    P720,
    P1080,
    P1440,
    P2160,
}

/// Encoding target for one resolution tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub struct ResolutionPreset {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Target video bitrate in kbps
    pub bitrate_kbps: u32,
}

impl ResolutionPreset {
    /// Check for a preset with a zero dimension.
    pub fn is_degenerate(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

impl Resolution {
    /// All tiers in dispatch order (descending height).
    pub const ALL: [Resolution; 6] = [
        Resolution::P2160,
        Resolution::P1440,
        Resolution::P1080,
        Resolution::P720,
        Resolution::P480,
        Resolution::P360,
    ];

    /// Pixel height of the tier.
    pub fn height(&self) -> u32 {
        match self {
            Resolution::P2160 => 2160,
            Resolution::P1440 => 1440,
            Resolution::P1080 => 1080,
            Resolution::P720 => 720,
            Resolution::P480 => 480,
            Resolution::P360 => 360,
        }
    }

    /// Encoding preset for the tier.
    pub fn preset(&self) -> ResolutionPreset {
        let (width, height, bitrate_kbps) = match self {
            Resolution::P2160 => (3840, 2160, 14000),
            Resolution::P1440 => (2560, 1440, 9000),
            Resolution::P1080 => (1920, 1080, 6500),
            Resolution::P720 => (1280, 720, 4000),
            Resolution::P480 => (854, 480, 2000),
            Resolution::P360 => (640, 360, 1000),
        };
        ResolutionPreset {
            width,
            height,
            bitrate_kbps,
        }
    }

    /// Look up a tier by exact pixel height.
    pub fn from_height(height: u32) -> Option<Self> {
        Self::ALL.into_iter().find(|r| r.height() == height)
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}P", self.height())
    }
}

/// Error parsing a resolution tag.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown resolution: {0}")]
pub struct ParseResolutionError(pub String);

impl FromStr for Resolution {
    type Err = ParseResolutionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s.trim().trim_end_matches(['p', 'P']);
        digits
            .parse::<u32>()
            .ok()
            .and_then(Self::from_height)
            .ok_or_else(|| ParseResolutionError(s.to_string()))
    }
}

impl From<Resolution> for String {
    fn from(r: Resolution) -> Self {
        r.to_string()
    }
}

impl TryFrom<String> for Resolution {
    type Error = ParseResolutionError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

/// Select the tiers to produce for a source of the given pixel height.
///
/// Every non-degenerate preset no taller than the source is kept, tallest
/// first. An empty result means the source cannot be transcoded.
pub fn target_resolutions(source_height: u32) -> Vec<Resolution> {
    Resolution::ALL
        .into_iter()
        .filter(|r| {
            let preset = r.preset();
            !preset.is_degenerate() && preset.height <= source_height
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_and_parse() {
        assert_eq!(Resolution::P720.to_string(), "720P");
        assert_eq!("1080P".parse::<Resolution>().unwrap(), Resolution::P1080);
        assert_eq!("480p".parse::<Resolution>().unwrap(), Resolution::P480);
        assert!("999P".parse::<Resolution>().is_err());
    }

    #[test]
    fn test_preset_table() {
        let preset = Resolution::P1080.preset();
        assert_eq!((preset.width, preset.height, preset.bitrate_kbps), (1920, 1080, 6500));
        assert!(Resolution::ALL.iter().all(|r| !r.preset().is_degenerate()));
    }

    #[test]
    fn test_targets_for_1080p_source() {
        assert_eq!(
            target_resolutions(1080),
            vec![
                Resolution::P1080,
                Resolution::P720,
                Resolution::P480,
                Resolution::P360
            ]
        );
    }

    #[test]
    fn test_targets_for_odd_height() {
        // 1280x718 still gets everything below 720p
        assert_eq!(
            target_resolutions(718),
            vec![Resolution::P480, Resolution::P360]
        );
    }

    #[test]
    fn test_targets_for_tiny_source() {
        assert!(target_resolutions(240).is_empty());
        assert!(target_resolutions(0).is_empty());
    }

    #[test]
    fn test_serde_uses_tag() {
        let json = serde_json::to_string(&Resolution::P1440).unwrap();
        assert_eq!(json, "\"1440P\"");
        let back: Resolution = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Resolution::P1440);
    }
}
