//! Metadata probing.
//!
//! A [`Prober`] turns an input file into normalized [`MediaMetadata`]. The
//! production backend is [`FfprobeProber`]; tests substitute their own.

use std::path::Path;

use async_trait::async_trait;
use of_core::{MediaMetadata, Result};

pub mod ffprobe;

pub use self::ffprobe::{parse_ffprobe_json, FfprobeProber};

/// Extracts normalized metadata from a media file.
///
/// Implementations must never hand back zero dimensions: an input without a
/// visual stream yields fallback metadata, and a visual stream without
/// dimensions is an [`of_core::Error::Probe`].
#[async_trait]
pub trait Prober: Send + Sync {
    /// Short backend name for logs.
    fn name(&self) -> &'static str;

    async fn probe(&self, path: &Path) -> Result<MediaMetadata>;
}
