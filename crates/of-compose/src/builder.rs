//! Filter graph construction.
//!
//! [`build`] realizes a [`CompositionPlan`] as a [`TranscodeSpec`]: the
//! secondary animation is retimed and scaled to a square, placed on the
//! primary stream at the plan's anchor, and the combined stream is resampled
//! to the plan's frame rate.

use std::fmt::Write as _;
use std::path::PathBuf;

use of_core::{Error, Result};

use crate::plan::{CompositionPlan, LoopStrategy};
use crate::spec::{format_secs, TranscodeInput, TranscodeSpec};

/// Label of the final video pad in the generated filter graph.
pub const OUTPUT_LABEL: &str = "[out]";

const VIDEO_ENCODER: &[&str] = &[
    "-c:v",
    "libx264",
    "-preset",
    "veryfast",
    "-crf",
    "23",
    "-c:a",
    "aac",
    "-b:a",
    "128k",
    "-movflags",
    "+faststart",
];

/// Filesystem locations a transcode reads from and writes to.
#[derive(Debug, Clone, PartialEq)]
pub struct TranscodePaths {
    /// The job's primary input (its inputRef).
    pub primary: PathBuf,
    /// The secondary animation composited on every job.
    pub overlay: PathBuf,
    /// Where the artifact is written (the job's outputRef).
    pub output: PathBuf,
}

/// Build the transcode description for a plan.
///
/// Fails only for plans no planner produces: a zero scale, a zero frame rate,
/// or a loop duration that is not a positive number of seconds.
pub fn build(plan: &CompositionPlan, paths: &TranscodePaths) -> Result<TranscodeSpec> {
    if plan.scale_factor_px < 1 {
        return Err(Error::Build("scale factor must be at least 1px".into()));
    }
    if plan.output_fps == 0 {
        return Err(Error::Build("output frame rate must be positive".into()));
    }
    if let Some(secs) = plan.loop_strategy.output_duration_secs() {
        if !(secs.is_finite() && secs > 0.0) {
            return Err(Error::Build(format!("invalid output duration {secs}")));
        }
    }

    let spec = TranscodeSpec {
        inputs: vec![primary_input(plan, paths), overlay_input(plan, paths)],
        filter_graph: filter_graph(plan),
        output_label: OUTPUT_LABEL.to_string(),
        output_options: VIDEO_ENCODER.iter().map(|s| s.to_string()).collect(),
        duration_secs: plan.loop_strategy.output_duration_secs(),
        fps: plan.output_fps,
        size_cap_bytes: plan.output_size_cap_bytes,
        output: paths.output.clone(),
    };

    tracing::debug!(filter_graph = %spec.filter_graph, "Filter graph built");
    Ok(spec)
}

fn primary_input(plan: &CompositionPlan, paths: &TranscodePaths) -> TranscodeInput {
    if !plan.primary_has_video {
        // Nothing to decode from the input; composite onto a black canvas of
        // the planned size.
        let canvas = format!(
            "color=c=black:s={}x{}:r={}",
            plan.input_width_px, plan.input_height_px, plan.output_fps
        );
        return TranscodeInput::new(canvas).options(["-f", "lavfi"]);
    }

    let input = TranscodeInput::new(&paths.primary);
    if plan.is_static() {
        // A single frame has to be repeated into a stream.
        input
            .options(["-loop", "1", "-framerate"])
            .option(plan.output_fps.to_string())
    } else {
        input
    }
}

fn overlay_input(plan: &CompositionPlan, paths: &TranscodePaths) -> TranscodeInput {
    let input = TranscodeInput::new(&paths.overlay);
    match plan.loop_strategy {
        LoopStrategy::NoLoop => input,
        LoopStrategy::LoopForDuration(secs) => input
            .options(["-stream_loop", "-1"])
            .options(["-t".to_string(), format_secs(secs)]),
        LoopStrategy::LoopIndefiniteCappedByOutputDuration(_) => {
            input.options(["-stream_loop", "-1"])
        }
    }
}

fn filter_graph(plan: &CompositionPlan) -> String {
    let side = plan.scale_factor_px;
    let mut graph = String::from("[1:v]");

    if !plan.overlay_speed.is_normal() {
        let _ = write!(graph, "setpts=PTS/{},", plan.overlay_speed.get());
    }
    let _ = write!(graph, "scale={side}:{side}:flags=lanczos[ovl];");

    let _ = write!(
        graph,
        "[0:v][ovl]overlay={}:{}",
        plan.overlay_anchor.x, plan.overlay_anchor.y
    );
    if let LoopStrategy::LoopForDuration(secs) = plan.loop_strategy {
        let _ = write!(graph, ":enable='between(t,0,{})'", format_secs(secs));
    }
    graph.push_str("[comp];");

    // yuv420p needs even dimensions.
    let _ = write!(
        graph,
        "[comp]fps={},pad=ceil(iw/2)*2:ceil(ih/2)*2,format=yuv420p{OUTPUT_LABEL}",
        plan.output_fps
    );

    graph
}
