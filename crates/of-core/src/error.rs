//! Unified error type for overlayforge.
//!
//! All crates funnel their failures into [`Error`]. Every variant maps to
//! exactly one [`FailureKind`] via [`Error::kind`], which is what a failed job
//! reports to the messaging gateway. The detailed error text stays in logs.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Unified error type covering all failure modes in overlayforge.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The input could not be read or is not a supported media file.
    #[error("Probe error: {0}")]
    Probe(String),

    /// Planning was handed metadata that violates the media model.
    #[error("Plan error: {0}")]
    Plan(String),

    /// A composition plan could not be turned into a transcode spec.
    #[error("Build error: {0}")]
    Build(String),

    /// An external tool (ffmpeg, ffprobe) returned an error.
    #[error("Tool error [{tool}]: {message}")]
    Tool {
        /// Name of the tool that failed.
        tool: String,
        /// Human-readable error description.
        message: String,
    },

    /// An external tool exceeded its wall-clock budget and was killed.
    #[error("Tool error [{tool}]: timed out after {after:?}")]
    Timeout {
        /// Name of the tool that was killed.
        tool: String,
        /// The budget that was exceeded.
        after: Duration,
    },

    /// The transcode step failed for a reason other than the tool exiting.
    #[error("Transcode error: {0}")]
    Transcode(String),

    /// The produced artifact is larger than the configured ceiling.
    #[error("Output size {actual} bytes exceeds limit of {limit} bytes")]
    SizeLimitExceeded {
        /// Size of the produced artifact.
        actual: u64,
        /// The configured ceiling.
        limit: u64,
    },

    /// Retrieving the source media failed.
    #[error("Download error: {0}")]
    Download(String),

    /// Request or configuration data failed validation.
    #[error("Validation error: {0}")]
    Validation(String),

    /// An I/O operation failed.
    #[error("IO error: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Catch-all for unexpected internal errors.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Classification reported for a failed job.
///
/// A job that ends in the failed state carries exactly one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Probe,
    Plan,
    Build,
    Transcode,
    Timeout,
    SizeLimitExceeded,
    Download,
    Internal,
}

impl FailureKind {
    /// The single user-facing message for this classification.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::Probe => "Sorry, I couldn't read that file. Is it an image, GIF or video?",
            Self::Plan | Self::Build | Self::Internal => {
                "Something went wrong on our side while preparing your media."
            }
            Self::Transcode => "Sorry, combining the media failed.",
            Self::Timeout => "Sorry, that took too long to process. Try a shorter clip.",
            Self::SizeLimitExceeded => "The result is too large to send. Try a shorter or smaller file.",
            Self::Download => "Sorry, I couldn't download that file.",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Probe => "probe_error",
            Self::Plan => "plan_error",
            Self::Build => "build_error",
            Self::Transcode => "transcode_error",
            Self::Timeout => "timeout",
            Self::SizeLimitExceeded => "size_limit_exceeded",
            Self::Download => "download_error",
            Self::Internal => "internal_error",
        };
        f.write_str(s)
    }
}

impl Error {
    /// Classify this error for reporting on a failed job.
    pub fn kind(&self) -> FailureKind {
        match self {
            Error::Probe(_) => FailureKind::Probe,
            Error::Plan(_) => FailureKind::Plan,
            Error::Build(_) => FailureKind::Build,
            Error::Tool { .. } | Error::Transcode(_) => FailureKind::Transcode,
            Error::Timeout { .. } => FailureKind::Timeout,
            Error::SizeLimitExceeded { .. } => FailureKind::SizeLimitExceeded,
            Error::Download(_) => FailureKind::Download,
            Error::Validation(_) | Error::Io { .. } | Error::Internal(_) => FailureKind::Internal,
        }
    }

    /// Convenience constructor for [`Error::Tool`].
    pub fn tool(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Tool {
            tool: tool.into(),
            message: message.into(),
        }
    }

    /// Convenience constructor for [`Error::Timeout`].
    pub fn timeout(tool: impl Into<String>, after: Duration) -> Self {
        Error::Timeout {
            tool: tool.into(),
            after,
        }
    }
}

/// Result alias using the crate-level [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
