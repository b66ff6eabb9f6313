//! # of-compose
//!
//! Pure composition logic: turning normalized media metadata into a
//! deterministic plan, and a plan into the transcoder invocation.
//!
//! ## Overview
//!
//! - [`Planner`] -- classification and sizing policy, `MediaMetadata -> CompositionPlan`.
//! - [`build`] -- filter graph construction, `CompositionPlan -> TranscodeSpec`.
//! - [`TranscodeSpec`] -- inputs, filter graph and output constraints, with an
//!   ffmpeg argument rendering.
//!
//! Nothing in this crate touches the filesystem or spawns processes.

pub mod builder;
pub mod plan;
pub mod spec;

pub use builder::{build, TranscodePaths};
pub use plan::{scale_factor_px, CompositionPlan, LoopStrategy, OverlayAnchor, Planner};
pub use spec::{TranscodeInput, TranscodeSpec};
