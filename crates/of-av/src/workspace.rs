//! Per-job transient storage.
//!
//! A [`JobWorkspace`] is a private temporary directory holding a job's input
//! (its inputRef) and produced artifact (its outputRef). It is created when
//! the job is enqueued and destroyed when the job reaches a terminal state.

use std::path::{Path, PathBuf};
use tempfile::TempDir;

const INPUT_FILE: &str = "input";
const OUTPUT_FILE: &str = "output.mp4";

/// Transient storage owned by exactly one job.
///
/// [`close`](Self::close) removes the directory and reports failures; if a
/// workspace is dropped without being closed the directory is still removed.
#[derive(Debug)]
pub struct JobWorkspace {
    temp_dir: TempDir,
}

impl JobWorkspace {
    /// Create a fresh workspace under the system temp directory.
    pub fn create() -> of_core::Result<Self> {
        let temp_dir = tempfile::Builder::new()
            .prefix("overlayforge-")
            .tempdir()
            .map_err(|e| of_core::Error::Internal(format!("failed to create job workspace: {e}")))?;
        Ok(Self { temp_dir })
    }

    /// Create a workspace inside `parent`.
    pub fn create_in(parent: &Path) -> of_core::Result<Self> {
        let temp_dir = tempfile::Builder::new()
            .prefix("overlayforge-")
            .tempdir_in(parent)
            .map_err(|e| of_core::Error::Internal(format!("failed to create job workspace: {e}")))?;
        Ok(Self { temp_dir })
    }

    /// Where the fetched source is stored.
    pub fn input(&self) -> PathBuf {
        self.temp_dir.path().join(INPUT_FILE)
    }

    /// Where the transcoder writes the artifact.
    pub fn output(&self) -> PathBuf {
        self.temp_dir.path().join(OUTPUT_FILE)
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Delete the workspace and everything in it.
    pub fn close(self) -> of_core::Result<()> {
        let path = self.temp_dir.path().to_path_buf();
        self.temp_dir.close().map_err(|e| {
            of_core::Error::Internal(format!(
                "failed to remove job workspace {}: {e}",
                path.display()
            ))
        })
    }
}
