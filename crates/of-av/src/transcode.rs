//! The transcoder capability.
//!
//! A [`Transcoder`] executes a [`TranscodeSpec`], leaving the artifact at
//! `spec.output`. [`FfmpegTranscoder`] renders the spec as an ffmpeg argument
//! list and runs it under the configured wall-clock budget.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use of_compose::TranscodeSpec;
use of_core::{Error, Result};

use crate::command::ToolCommand;

#[async_trait]
pub trait Transcoder: Send + Sync {
    /// Produce the artifact described by `spec`.
    ///
    /// Tool failures surface as [`Error::Tool`], budget overruns as
    /// [`Error::Timeout`].
    async fn transcode(&self, spec: &TranscodeSpec) -> Result<()>;
}

/// Runs ffmpeg.
#[derive(Debug, Clone)]
pub struct FfmpegTranscoder {
    ffmpeg_path: PathBuf,
    timeout: Duration,
}

impl FfmpegTranscoder {
    pub fn new(ffmpeg_path: PathBuf, timeout: Duration) -> Self {
        Self {
            ffmpeg_path,
            timeout,
        }
    }

    /// The command that would be executed for `spec`.
    pub fn command(&self, spec: &TranscodeSpec) -> ToolCommand {
        let mut cmd = ToolCommand::new(self.ffmpeg_path.clone());
        cmd.args(spec.to_ffmpeg_args()).timeout(self.timeout);
        cmd
    }
}

#[async_trait]
impl Transcoder for FfmpegTranscoder {
    async fn transcode(&self, spec: &TranscodeSpec) -> Result<()> {
        tracing::debug!(args = ?spec.to_ffmpeg_args(), "Running ffmpeg");

        let output = self.command(spec).execute().await?;
        if !output.stderr.trim().is_empty() {
            tracing::debug!(stderr = %output.stderr.trim(), "ffmpeg diagnostics");
        }

        if !spec.output.exists() {
            return Err(Error::Transcode(format!(
                "ffmpeg exited cleanly but produced no output at {}",
                spec.output.display()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use of_compose::TranscodeInput;

    fn spec(output: PathBuf) -> TranscodeSpec {
        TranscodeSpec {
            inputs: vec![TranscodeInput::new("in"), TranscodeInput::new("overlay.gif")],
            filter_graph: "[0:v][1:v]overlay[out]".into(),
            output_label: "[out]".into(),
            output_options: Vec::new(),
            duration_secs: Some(1.0),
            fps: 30,
            size_cap_bytes: 1024,
            output,
        }
    }

    #[tokio::test]
    async fn missing_ffmpeg_is_tool_error() {
        let dir = tempfile::tempdir().unwrap();
        let transcoder = FfmpegTranscoder::new(
            PathBuf::from("nonexistent_ffmpeg_xyz"),
            Duration::from_secs(5),
        );
        let result = transcoder.transcode(&spec(dir.path().join("out.mp4"))).await;
        assert_matches!(result, Err(Error::Tool { .. }));
        assert_eq!(result.unwrap_err().kind(), of_core::FailureKind::Transcode);
    }

    #[tokio::test]
    async fn clean_exit_without_output_is_transcode_error() {
        // `true` ignores its arguments and exits 0.
        let Ok(true_path) = which::which("true") else {
            return;
        };
        let dir = tempfile::tempdir().unwrap();
        let transcoder = FfmpegTranscoder::new(true_path, Duration::from_secs(5));
        let result = transcoder.transcode(&spec(dir.path().join("out.mp4"))).await;
        assert_matches!(result, Err(Error::Transcode(_)));
    }
}
