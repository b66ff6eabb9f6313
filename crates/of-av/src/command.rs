//! Builder for executing external tool commands under a wall-clock budget.

use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::process::Command;

/// Default command timeout: 5 minutes.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

/// Longest stderr excerpt carried in an error message.
const MAX_STDERR_CHARS: usize = 2000;

/// Output captured from a tool execution.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    /// Process exit status.
    pub status: ExitStatus,
    /// Captured standard output (lossy UTF-8).
    pub stdout: String,
    /// Captured standard error (lossy UTF-8).
    pub stderr: String,
}

/// A builder for constructing and executing external tool invocations.
///
/// # Example
///
/// ```no_run
/// use of_av::ToolCommand;
/// use std::path::PathBuf;
///
/// # async fn example() -> of_core::Result<()> {
/// let output = ToolCommand::new(PathBuf::from("ffprobe"))
///     .arg("-v").arg("error")
///     .arg("-print_format").arg("json")
///     .arg("-show_streams")
///     .arg("/path/to/clip.mp4")
///     .execute()
///     .await?;
/// println!("{}", output.stdout);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ToolCommand {
    program: PathBuf,
    args: Vec<String>,
    timeout: Duration,
}

impl ToolCommand {
    /// Create a new command for the given program path.
    pub fn new(program: PathBuf) -> Self {
        Self {
            program,
            args: Vec::new(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Append a single argument.
    pub fn arg(&mut self, s: impl Into<String>) -> &mut Self {
        self.args.push(s.into());
        self
    }

    /// Append multiple arguments.
    pub fn args(&mut self, iter: impl IntoIterator<Item = impl Into<String>>) -> &mut Self {
        self.args.extend(iter.into_iter().map(Into::into));
        self
    }

    /// Set the maximum execution time.
    pub fn timeout(&mut self, d: Duration) -> &mut Self {
        self.timeout = d;
        self
    }

    /// Name used for this tool in errors and logs.
    pub fn program_name(&self) -> String {
        self.program
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| self.program.to_string_lossy().to_string())
    }

    /// Execute the command, capturing stdout and stderr.
    ///
    /// # Errors
    ///
    /// - [`of_core::Error::Timeout`] if the process outlives its budget. The
    ///   child is killed before this returns.
    /// - [`of_core::Error::Tool`] if the process exits with a non-zero status
    ///   (message includes stderr) or cannot be spawned.
    pub async fn execute(&self) -> of_core::Result<ToolOutput> {
        let program_name = self.program_name();

        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        tracing::trace!(tool = %program_name, args = ?self.args, "Spawning tool");

        let child = cmd
            .spawn()
            .map_err(|e| of_core::Error::tool(&program_name, format!("failed to spawn: {e}")))?;

        // Dropping the pending future on timeout drops the child, which
        // kill_on_drop turns into a SIGKILL.
        let result = tokio::time::timeout(self.timeout, child.wait_with_output()).await;

        match result {
            Ok(Ok(output)) => {
                let tool_output = ToolOutput {
                    status: output.status,
                    stdout: String::from_utf8_lossy(&output.stdout).to_string(),
                    stderr: String::from_utf8_lossy(&output.stderr).to_string(),
                };

                if !output.status.success() {
                    return Err(of_core::Error::tool(
                        program_name,
                        format!(
                            "exited with status {}: {}",
                            output.status,
                            stderr_excerpt(&tool_output.stderr)
                        ),
                    ));
                }

                Ok(tool_output)
            }
            Ok(Err(e)) => Err(of_core::Error::tool(
                program_name,
                format!("I/O error waiting for process: {e}"),
            )),
            Err(_elapsed) => {
                tracing::warn!(tool = %program_name, timeout = ?self.timeout, "Tool timed out, killed");
                Err(of_core::Error::timeout(program_name, self.timeout))
            }
        }
    }
}

/// The last [`MAX_STDERR_CHARS`] characters of trimmed stderr.
fn stderr_excerpt(stderr: &str) -> &str {
    let trimmed = stderr.trim();
    match trimmed.char_indices().rev().nth(MAX_STDERR_CHARS - 1) {
        Some((idx, _)) => &trimmed[idx..],
        None => trimmed,
    }
}
