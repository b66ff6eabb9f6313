//! Media-domain model: the normalized metadata produced by probing and the
//! classification derived from it.
//!
//! Probers feed raw, partially-unreliable tool output through the helpers in
//! this module so that planning only ever sees positive dimensions and either
//! a usable duration or none at all.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Error, Result};

/// Width/height assumed when an input has no visual stream to measure.
pub const FALLBACK_DIMENSION_PX: u32 = 500;

/// Default frame-rate floor, also used when the input does not report a rate.
pub const DEFAULT_FPS: f64 = 30.0;

/// Codecs that carry animation inside an image format.
const ANIMATED_IMAGE_CODECS: &[&str] = &["gif", "webp", "apng"];

// ---------------------------------------------------------------------------
// MediaKind
// ---------------------------------------------------------------------------

/// Temporal classification of an input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Video,
    AnimatedImage,
    StaticImage,
}

impl MediaKind {
    /// Whether the input changes over time.
    pub fn is_temporal(&self) -> bool {
        !matches!(self, Self::StaticImage)
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Video => write!(f, "video"),
            Self::AnimatedImage => write!(f, "animated_image"),
            Self::StaticImage => write!(f, "static_image"),
        }
    }
}

// ---------------------------------------------------------------------------
// MediaMetadata
// ---------------------------------------------------------------------------

/// Normalized metadata for one job's input.
///
/// Produced once per job by a prober and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaMetadata {
    pub width_px: u32,
    pub height_px: u32,
    /// Duration in seconds; `None` when unknown or unusable.
    pub duration_secs: Option<f64>,
    /// Number of frames, at least 1.
    pub frame_count: u64,
    /// Frame rate in frames per second; `None` when not reported.
    pub fps: Option<f64>,
    /// Codec of the primary visual stream, if any.
    pub codec: Option<String>,
    /// `false` when the input had no visual stream and fallback dimensions
    /// were substituted.
    pub has_visual_stream: bool,
}

impl MediaMetadata {
    /// Metadata for an input with no visual stream: a single still frame at
    /// the fallback size.
    pub fn fallback(dimension_px: u32) -> Self {
        Self {
            width_px: dimension_px,
            height_px: dimension_px,
            duration_secs: None,
            frame_count: 1,
            fps: None,
            codec: None,
            has_visual_stream: false,
        }
    }

    /// Usable duration, with invalid values treated as absent.
    pub fn duration(&self) -> Option<f64> {
        self.duration_secs.and_then(normalize_seconds)
    }

    /// Frame rate, or `default` when absent or invalid.
    pub fn fps_or(&self, default: f64) -> f64 {
        self.fps
            .filter(|f| f.is_finite() && *f > 0.0)
            .unwrap_or(default)
    }

    /// Derive the temporal classification.
    ///
    /// A positive duration wins over a frame count of 1.
    pub fn kind(&self) -> MediaKind {
        let temporal = self.duration().is_some() || self.frame_count > 1;
        if !temporal {
            return MediaKind::StaticImage;
        }
        match self.codec.as_deref() {
            Some(codec) if is_animated_image_codec(codec) => MediaKind::AnimatedImage,
            _ => MediaKind::Video,
        }
    }
}

/// Whether `codec` is an animated image codec (GIF, WebP, APNG).
pub fn is_animated_image_codec(codec: &str) -> bool {
    let lower = codec.to_ascii_lowercase();
    ANIMATED_IMAGE_CODECS.contains(&lower.as_str())
}

/// Keep a duration only if it is finite and strictly positive.
pub fn normalize_seconds(secs: f64) -> Option<f64> {
    (secs.is_finite() && secs > 0.0).then_some(secs)
}

/// Parse a tool-reported duration such as `"12.480000"` or `"N/A"`.
pub fn parse_duration(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok().and_then(normalize_seconds)
}

/// Parse a rational frame rate such as `"24000/1001"`, `"30/1"` or `"25"`.
///
/// `"0/0"` and other non-positive rates yield `None`.
pub fn parse_frame_rate(rate_str: &str) -> Option<f64> {
    let rate = match rate_str.split_once('/') {
        Some((num, den)) => {
            let num: f64 = num.trim().parse().ok()?;
            let den: f64 = den.trim().parse().ok()?;
            if den == 0.0 {
                return None;
            }
            num / den
        }
        None => rate_str.trim().parse().ok()?,
    };
    (rate.is_finite() && rate > 0.0).then_some(rate)
}

// ---------------------------------------------------------------------------
// OverlaySpeed
// ---------------------------------------------------------------------------

/// Playback speed multiplier for the overlay animation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct OverlaySpeed(f64);

impl OverlaySpeed {
    pub const MIN: f64 = 0.1;
    pub const MAX: f64 = 3.0;

    /// Validate and wrap a speed multiplier.
    pub fn new(speed: f64) -> Result<Self> {
        if !(Self::MIN..=Self::MAX).contains(&speed) {
            return Err(Error::Validation(format!(
                "overlay speed must be between {} and {}, got {speed}",
                Self::MIN,
                Self::MAX
            )));
        }
        Ok(Self(speed))
    }

    pub fn get(&self) -> f64 {
        self.0
    }

    /// Whether the overlay plays at its native rate.
    pub fn is_normal(&self) -> bool {
        (self.0 - 1.0).abs() < f64::EPSILON
    }
}

impl Default for OverlaySpeed {
    fn default() -> Self {
        Self(1.0)
    }
}

impl TryFrom<f64> for OverlaySpeed {
    type Error = Error;

    fn try_from(value: f64) -> Result<Self> {
        Self::new(value)
    }
}

impl From<OverlaySpeed> for f64 {
    fn from(speed: OverlaySpeed) -> Self {
        speed.0
    }
}

impl fmt::Display for OverlaySpeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn still(width_px: u32, height_px: u32) -> MediaMetadata {
        MediaMetadata {
            width_px,
            height_px,
            duration_secs: None,
            frame_count: 1,
            fps: None,
            codec: Some("png".into()),
            has_visual_stream: true,
        }
    }

    #[test]
    fn single_frame_without_duration_is_static() {
        assert_eq!(still(800, 600).kind(), MediaKind::StaticImage);
    }

    #[test]
    fn duration_wins_over_single_frame() {
        let meta = MediaMetadata {
            duration_secs: Some(3.0),
            codec: Some("h264".into()),
            ..still(1920, 1080)
        };
        assert_eq!(meta.frame_count, 1);
        assert_eq!(meta.kind(), MediaKind::Video);
    }

    #[test]
    fn multiple_frames_without_duration_are_temporal() {
        let meta = MediaMetadata {
            frame_count: 12,
            codec: Some("gif".into()),
            ..still(320, 240)
        };
        assert_eq!(meta.kind(), MediaKind::AnimatedImage);
    }

    #[test]
    fn nan_and_negative_durations_are_absent() {
        let nan = MediaMetadata {
            duration_secs: Some(f64::NAN),
            ..still(10, 10)
        };
        let negative = MediaMetadata {
            duration_secs: Some(-1.0),
            ..still(10, 10)
        };
        assert_eq!(nan.duration(), None);
        assert_eq!(negative.duration(), None);
        assert_eq!(nan.kind(), MediaKind::StaticImage);
    }

    #[test]
    fn fallback_metadata() {
        let meta = MediaMetadata::fallback(FALLBACK_DIMENSION_PX);
        assert_eq!((meta.width_px, meta.height_px), (500, 500));
        assert!(!meta.has_visual_stream);
        assert_eq!(meta.kind(), MediaKind::StaticImage);
        assert_eq!(meta.fps_or(24.0), 24.0);
    }

    #[test]
    fn duration_parsing() {
        assert_eq!(parse_duration("12.480000"), Some(12.48));
        assert_eq!(parse_duration("N/A"), None);
        assert_eq!(parse_duration("nan"), None);
        assert_eq!(parse_duration("0.000000"), None);
        assert_eq!(parse_duration("inf"), None);
    }

    #[test]
    fn frame_rate_parsing() {
        assert!((parse_frame_rate("24000/1001").unwrap() - 23.976).abs() < 0.01);
        assert_eq!(parse_frame_rate("30/1"), Some(30.0));
        assert_eq!(parse_frame_rate("25"), Some(25.0));
        assert_eq!(parse_frame_rate("0/0"), None);
        assert_eq!(parse_frame_rate("invalid"), None);
    }

    #[test]
    fn animated_codec_detection() {
        assert!(is_animated_image_codec("gif"));
        assert!(is_animated_image_codec("WEBP"));
        assert!(!is_animated_image_codec("h264"));
    }

    #[test]
    fn overlay_speed_bounds() {
        assert!(OverlaySpeed::new(0.1).is_ok());
        assert!(OverlaySpeed::new(3.0).is_ok());
        assert!(OverlaySpeed::new(0.05).is_err());
        assert!(OverlaySpeed::new(3.5).is_err());
        assert!(OverlaySpeed::new(f64::NAN).is_err());
        assert!(OverlaySpeed::default().is_normal());
    }

    #[test]
    fn overlay_speed_deserialize_validates() {
        let ok: OverlaySpeed = serde_json::from_str("2.0").unwrap();
        assert_eq!(ok.get(), 2.0);
        assert!(serde_json::from_str::<OverlaySpeed>("9.0").is_err());
    }
}
