//! FFprobe-based [`Prober`] implementation.
//!
//! Shells out to
//! `ffprobe -v error -print_format json -show_format -show_streams -count_packets`
//! and normalizes the JSON into [`MediaMetadata`].

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use of_core::media::{is_animated_image_codec, parse_duration, parse_frame_rate};
use of_core::{Error, MediaMetadata, Result, FALLBACK_DIMENSION_PX};
use serde::Deserialize;

use super::Prober;
use crate::command::ToolCommand;

/// Codecs whose single frame is a still picture even when the container
/// reports a duration for it.
const STILL_IMAGE_CODECS: &[&str] = &[
    "png", "mjpeg", "jpegls", "jpeg2000", "bmp", "tiff", "qoi", "targa", "ppm", "pgm", "pbm",
    "pam", "sgi", "dpx", "exr", "hdr",
];

/// A prober backed by the `ffprobe` CLI.
#[derive(Debug, Clone)]
pub struct FfprobeProber {
    ffprobe_path: PathBuf,
    timeout: Duration,
    fallback_dimension_px: u32,
}

impl FfprobeProber {
    /// Create a new prober using the given ffprobe path.
    pub fn new(ffprobe_path: PathBuf) -> Self {
        Self {
            ffprobe_path,
            timeout: Duration::from_secs(30),
            fallback_dimension_px: FALLBACK_DIMENSION_PX,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Dimensions assumed for inputs without a visual stream.
    pub fn with_fallback_dimension(mut self, px: u32) -> Self {
        self.fallback_dimension_px = px;
        self
    }
}

#[async_trait]
impl Prober for FfprobeProber {
    fn name(&self) -> &'static str {
        "ffprobe"
    }

    async fn probe(&self, path: &Path) -> Result<MediaMetadata> {
        let mut cmd = ToolCommand::new(self.ffprobe_path.clone());
        cmd.args([
            "-v",
            "error",
            "-print_format",
            "json",
            "-show_format",
            "-show_streams",
            "-count_packets",
        ]);
        cmd.arg(path.to_string_lossy().as_ref());
        cmd.timeout(self.timeout);

        // A non-zero exit means ffprobe could not read the input.
        let output = cmd.execute().await.map_err(|e| match e {
            Error::Tool { message, .. } => Error::Probe(message),
            other => other,
        })?;

        parse_ffprobe_json(&output.stdout, self.fallback_dimension_px)
    }
}

// ---------------------------------------------------------------------------
// JSON structures
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
struct FfprobeOutput {
    #[serde(default)]
    format: FfprobeFormat,
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Default, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct FfprobeStream {
    codec_type: Option<String>,
    codec_name: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    duration: Option<String>,
    nb_frames: Option<String>,
    nb_read_packets: Option<String>,
    avg_frame_rate: Option<String>,
    r_frame_rate: Option<String>,
}

// ---------------------------------------------------------------------------
// Normalization
// ---------------------------------------------------------------------------

/// Normalize raw ffprobe JSON into [`MediaMetadata`].
///
/// - No streams at all: [`Error::Probe`].
/// - Streams but none visual: fallback metadata at `fallback_dimension_px`.
/// - A visual stream without positive width and height: [`Error::Probe`].
pub fn parse_ffprobe_json(json: &str, fallback_dimension_px: u32) -> Result<MediaMetadata> {
    let output: FfprobeOutput = serde_json::from_str(json)
        .map_err(|e| Error::Probe(format!("ffprobe JSON parse error: {e}")))?;
    normalize(output, fallback_dimension_px)
}

fn normalize(output: FfprobeOutput, fallback_dimension_px: u32) -> Result<MediaMetadata> {
    if output.streams.is_empty() {
        return Err(Error::Probe("input contains no streams".into()));
    }

    let Some(stream) = output
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video"))
    else {
        tracing::debug!("No visual stream, using fallback dimensions");
        return Ok(MediaMetadata::fallback(fallback_dimension_px));
    };

    let (width_px, height_px) = match (stream.width, stream.height) {
        (Some(w), Some(h)) if w > 0 && h > 0 => (w, h),
        (w, h) => {
            return Err(Error::Probe(format!(
                "visual stream reports no usable dimensions ({w:?}x{h:?})"
            )))
        }
    };

    let frame_count = parse_count(stream.nb_frames.as_deref())
        .or_else(|| parse_count(stream.nb_read_packets.as_deref()))
        .unwrap_or(1);

    let codec = stream.codec_name.clone();

    let mut duration_secs = output
        .format
        .duration
        .as_deref()
        .and_then(parse_duration)
        .or_else(|| stream.duration.as_deref().and_then(parse_duration));

    if frame_count <= 1 && codec.as_deref().is_some_and(is_image_codec) {
        // Image demuxers synthesize a one-frame duration.
        duration_secs = None;
    }

    let fps = stream
        .avg_frame_rate
        .as_deref()
        .and_then(parse_frame_rate)
        .or_else(|| stream.r_frame_rate.as_deref().and_then(parse_frame_rate));

    Ok(MediaMetadata {
        width_px,
        height_px,
        duration_secs,
        frame_count,
        fps,
        codec,
        has_visual_stream: true,
    })
}

/// Parse a frame/packet count; zero and garbage are treated as unreported.
fn parse_count(raw: Option<&str>) -> Option<u64> {
    raw?.trim().parse::<u64>().ok().filter(|n| *n > 0)
}

fn is_image_codec(codec: &str) -> bool {
    let lower = codec.to_ascii_lowercase();
    STILL_IMAGE_CODECS.contains(&lower.as_str()) || is_animated_image_codec(&lower)
}
