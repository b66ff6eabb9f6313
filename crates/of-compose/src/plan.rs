//! Composition planning.
//!
//! [`Planner::plan`] turns one job's normalized [`MediaMetadata`] into the
//! [`CompositionPlan`] every later stage works from. It is a pure function of
//! its inputs and the policy it was built with: no I/O, no clock, no cache.

use of_core::config::PolicyConfig;
use of_core::{Error, MediaKind, MediaMetadata, OverlaySpeed, Result};
use serde::{Deserialize, Serialize};

/// How the secondary animation is repeated relative to the primary input.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopStrategy {
    /// Play the secondary animation once.
    NoLoop,
    /// Repeat the secondary animation and cut both layers at this many seconds.
    LoopForDuration(f64),
    /// Repeat the secondary animation with no natural end; the output is cut
    /// at this many seconds.
    LoopIndefiniteCappedByOutputDuration(f64),
}

impl LoopStrategy {
    /// Length of the produced artifact in seconds, if bounded.
    pub fn output_duration_secs(&self) -> Option<f64> {
        match self {
            Self::NoLoop => None,
            Self::LoopForDuration(secs) | Self::LoopIndefiniteCappedByOutputDuration(secs) => {
                Some(*secs)
            }
        }
    }

    /// Whether the secondary animation input must be repeated.
    pub fn loops_overlay(&self) -> bool {
        !matches!(self, Self::NoLoop)
    }
}

/// Top-left corner of the overlay on the primary stream, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverlayAnchor {
    pub x: u32,
    pub y: u32,
}

impl OverlayAnchor {
    /// Anchor a square overlay of `overlay_px` to the bottom-left corner.
    pub fn bottom_left(input_height_px: u32, overlay_px: u32) -> Self {
        Self {
            x: 0,
            y: input_height_px.saturating_sub(overlay_px),
        }
    }
}

/// The derived transform parameters for one job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompositionPlan {
    pub kind: MediaKind,
    pub input_width_px: u32,
    pub input_height_px: u32,
    /// False when the input had no visual stream and its dimensions are the
    /// fallback; the primary layer is then a blank canvas.
    pub primary_has_video: bool,
    /// Side of the square the secondary animation is scaled to.
    pub scale_factor_px: u32,
    pub loop_strategy: LoopStrategy,
    /// Frame rate of the output after applying the floor and the cap.
    pub output_fps: u32,
    pub output_fps_cap: u32,
    pub output_size_cap_bytes: u64,
    pub overlay_anchor: OverlayAnchor,
    pub overlay_speed: OverlaySpeed,
}

impl CompositionPlan {
    /// Whether the primary input is a single still frame that has to be
    /// turned into a stream.
    pub fn is_static(&self) -> bool {
        !self.kind.is_temporal()
    }
}

/// Side of the square overlay for an input of the given size.
///
/// Half the shorter dimension, rounded down, and never below one pixel.
pub fn scale_factor_px(width_px: u32, height_px: u32) -> u32 {
    (width_px.min(height_px) / 2).max(1)
}

/// Applies the composition policy to probed metadata.
#[derive(Debug, Clone, Default)]
pub struct Planner {
    policy: PolicyConfig,
}

impl Planner {
    pub fn new(policy: PolicyConfig) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &PolicyConfig {
        &self.policy
    }

    /// Derive the composition plan for one input.
    ///
    /// Only metadata that breaks the media model (zero dimensions) is
    /// rejected; every probed input yields a plan.
    pub fn plan(&self, metadata: &MediaMetadata, speed: OverlaySpeed) -> Result<CompositionPlan> {
        if metadata.width_px == 0 || metadata.height_px == 0 {
            return Err(Error::Plan(format!(
                "invalid dimensions {}x{}",
                metadata.width_px, metadata.height_px
            )));
        }

        let kind = metadata.kind();
        let scale = scale_factor_px(metadata.width_px, metadata.height_px);

        let loop_strategy = match (kind, metadata.duration()) {
            (MediaKind::StaticImage, _) | (_, None) => {
                LoopStrategy::LoopIndefiniteCappedByOutputDuration(self.policy.default_loop_secs)
            }
            (_, Some(secs)) => LoopStrategy::LoopForDuration(secs),
        };

        let output_fps = self.output_fps(metadata);

        tracing::trace!(
            %kind,
            width = metadata.width_px,
            height = metadata.height_px,
            scale,
            output_fps,
            ?loop_strategy,
            "Composition planned"
        );

        Ok(CompositionPlan {
            kind,
            input_width_px: metadata.width_px,
            input_height_px: metadata.height_px,
            primary_has_video: metadata.has_visual_stream,
            scale_factor_px: scale,
            loop_strategy,
            output_fps,
            output_fps_cap: self.policy.fps_cap,
            output_size_cap_bytes: self.policy.size_cap_bytes,
            overlay_anchor: OverlayAnchor::bottom_left(metadata.height_px, scale),
            overlay_speed: speed,
        })
    }

    /// Input frame rate raised to the floor, rounded up, then clamped to the
    /// cap. An input without a usable rate runs at the floor.
    fn output_fps(&self, metadata: &MediaMetadata) -> u32 {
        let floor = f64::from(self.policy.min_fps);
        let fps = metadata.fps_or(floor).max(floor).ceil();
        let cap = self.policy.fps_cap;
        if fps >= f64::from(cap) {
            cap
        } else {
            fps as u32
        }
    }
}
