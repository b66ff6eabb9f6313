//! The executable description handed to the transcoder.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// One input of the transcode, with the demuxer options that precede it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscodeInput {
    pub options: Vec<String>,
    pub path: PathBuf,
}

impl TranscodeInput {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            options: Vec::new(),
            path: path.into(),
        }
    }

    pub fn option(mut self, opt: impl Into<String>) -> Self {
        self.options.push(opt.into());
        self
    }

    pub fn options<I, S>(mut self, opts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.options.extend(opts.into_iter().map(Into::into));
        self
    }
}

/// Inputs, filter graph and output constraints for one composition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscodeSpec {
    /// Primary input first, secondary animation second.
    pub inputs: Vec<TranscodeInput>,
    pub filter_graph: String,
    /// Label of the filter graph pad that carries the final video.
    pub output_label: String,
    /// Encoder options.
    pub output_options: Vec<String>,
    /// Hard cut applied to the output, in seconds.
    pub duration_secs: Option<f64>,
    pub fps: u32,
    pub size_cap_bytes: u64,
    pub output: PathBuf,
}

impl TranscodeSpec {
    /// Render the full ffmpeg argument list.
    pub fn to_ffmpeg_args(&self) -> Vec<String> {
        let mut args: Vec<String> = ["-hide_banner", "-nostdin", "-loglevel", "error"]
            .into_iter()
            .map(String::from)
            .collect();

        for input in &self.inputs {
            args.extend(input.options.iter().cloned());
            args.push("-i".into());
            args.push(input.path.to_string_lossy().into_owned());
        }

        args.push("-filter_complex".into());
        args.push(self.filter_graph.clone());
        args.push("-map".into());
        args.push(self.output_label.clone());
        // Primary audio, when there is any.
        args.push("-map".into());
        args.push("0:a?".into());

        args.extend(self.output_options.iter().cloned());

        if let Some(secs) = self.duration_secs {
            args.push("-t".into());
            args.push(format_secs(secs));
        }

        // One byte over the cap so an oversize encode stops early and still
        // fails validation.
        args.push("-fs".into());
        args.push(self.size_cap_bytes.saturating_add(1).to_string());

        args.push("-y".into());
        args.push(self.output.to_string_lossy().into_owned());
        args
    }
}

/// Seconds formatted for ffmpeg duration options, without trailing zeros.
///
/// Millisecond precision; a positive duration never renders as zero.
pub(crate) fn format_secs(secs: f64) -> String {
    let s = format!("{:.3}", secs.max(0.001));
    let s = s.trim_end_matches('0').trim_end_matches('.');
    s.to_string()
}
