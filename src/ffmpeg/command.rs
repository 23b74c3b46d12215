//! Builder for running ffmpeg/ffprobe with a timeout.

use crate::error::TranscodeError;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

/// Captured output of a successful run.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    pub stdout: String,
    pub stderr: String,
}

/// One external tool invocation.
#[derive(Debug, Clone)]
pub struct ToolCommand {
    program: PathBuf,
    args: Vec<String>,
    timeout: Duration,
}

impl ToolCommand {
    pub fn new(program: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            timeout,
        }
    }

    pub fn arg(&mut self, s: impl Into<String>) -> &mut Self {
        self.args.push(s.into());
        self
    }

    pub fn args(&mut self, iter: impl IntoIterator<Item = impl Into<String>>) -> &mut Self {
        self.args.extend(iter.into_iter().map(Into::into));
        self
    }

    fn tool_name(&self) -> String {
        self.program
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| self.program.to_string_lossy().to_string())
    }

    /// Run to completion, capturing stdout and stderr.
    ///
    /// A non-zero exit becomes [`TranscodeError::ToolFailed`] carrying the
    /// trimmed stderr. When the timeout fires the child is killed and
    /// [`TranscodeError::Timeout`] is returned.
    pub async fn execute(&self) -> Result<ToolOutput, TranscodeError> {
        let tool = self.tool_name();

        let child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| TranscodeError::ToolFailed {
                tool: tool.clone(),
                detail: format!("failed to spawn: {e}"),
            })?;

        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                return Err(TranscodeError::ToolFailed {
                    tool,
                    detail: format!("I/O error waiting for process: {e}"),
                })
            }
            // Dropping the future drops the child, which kills it.
            Err(_elapsed) => {
                return Err(TranscodeError::Timeout {
                    tool,
                    secs: self.timeout.as_secs(),
                })
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();
        if !output.status.success() {
            return Err(TranscodeError::ToolFailed {
                tool,
                detail: format!("exited with {}: {}", output.status, stderr.trim()),
            });
        }
        Ok(ToolOutput { stdout, stderr })
    }
}
