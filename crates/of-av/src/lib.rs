//! # of-av
//!
//! External tool plumbing for the overlayforge pipeline.
//!
//! This crate provides:
//!
//! - **Tool discovery** ([`ToolRegistry`]) -- find and cache paths to ffmpeg
//!   and ffprobe.
//! - **Command execution** ([`ToolCommand`]) -- async builder that runs an
//!   external process under a wall-clock budget and kills it on expiry.
//! - **Job workspaces** ([`JobWorkspace`]) -- the private temporary directory
//!   holding one job's input and output.
//! - **Probing** ([`Prober`], [`FfprobeProber`]) -- normalized
//!   [`of_core::MediaMetadata`] from an input file.
//! - **Transcoding** ([`Transcoder`], [`FfmpegTranscoder`]) -- executes a
//!   [`of_compose::TranscodeSpec`].

pub mod command;
pub mod probe;
pub mod tools;
pub mod transcode;
pub mod workspace;

pub use command::{ToolCommand, ToolOutput};
pub use probe::{FfprobeProber, Prober};
pub use tools::{ToolInfo, ToolRegistry};
pub use transcode::{FfmpegTranscoder, Transcoder};
pub use workspace::JobWorkspace;
