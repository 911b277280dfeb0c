#[cfg(windows)]
use std::os::windows::process::CommandExt;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, trace, warn};
use thiserror::Error;

#[cfg(windows)]
const CREATE_NO_WINDOW: u32 = 0x08000000;

pub trait HideWindow {
    fn hide_window(&mut self) -> &mut Self;
}

impl HideWindow for tokio::process::Command {
    #[cfg(windows)]
    fn hide_window(&mut self) -> &mut Self {
        self.creation_flags(CREATE_NO_WINDOW)
    }

    #[cfg(not(windows))]
    fn hide_window(&mut self) -> &mut Self {
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("{program} not found")]
    NotFound { program: String },

    #[error("{program} timed out after {seconds}s")]
    Timeout { program: String, seconds: u64 },

    #[error("failed to run {program} ({kind}): {message}")]
    Io {
        program: String,
        kind: std::io::ErrorKind,
        message: String,
    },
}

impl CommandError {
    pub fn not_found(program: impl Into<String>) -> Self {
        Self::NotFound {
            program: program.into(),
        }
    }

    pub fn timeout(program: impl Into<String>, timeout: Duration) -> Self {
        Self::Timeout {
            program: program.into(),
            seconds: timeout.as_secs(),
        }
    }

    fn io(program: &str, error: &std::io::Error) -> Self {
        Self::Io {
            program: program.to_string(),
            kind: error.kind(),
            message: error.to_string(),
        }
    }

    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

/// Captured result of an external command that ran to completion.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            code: Some(0),
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    pub fn failed(code: i32, stderr: impl Into<String>) -> Self {
        Self {
            code: Some(code),
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    #[must_use]
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// Lowercased stdout and stderr, for matching package-manager phrases.
    #[must_use]
    pub fn combined_lowercase(&self) -> String {
        format!("{}\n{}", self.stdout, self.stderr).to_lowercase()
    }
}

/// Runs external programs. Every call is bounded by `timeout`.
///
/// A call that exceeds its timeout yields [`CommandError::Timeout`]. The
/// system runner kills the child when its future is dropped.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(
        &self,
        program: &str,
        args: &[&str],
        timeout: Duration,
    ) -> Result<CommandOutput, CommandError>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

#[async_trait]
impl CommandRunner for SystemRunner {
    async fn run(
        &self,
        program: &str,
        args: &[&str],
        timeout: Duration,
    ) -> Result<CommandOutput, CommandError> {
        let resolved = which::which(program).map_err(|_| CommandError::not_found(program))?;

        debug!("Running {} {}", resolved.display(), args.join(" "));

        let mut cmd = tokio::process::Command::new(&resolved);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd.hide_window();

        let output = match tokio::time::timeout(timeout, cmd.output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(error)) if error.kind() == std::io::ErrorKind::NotFound => {
                return Err(CommandError::not_found(program));
            }
            Ok(Err(error)) => return Err(CommandError::io(program, &error)),
            Err(_) => {
                warn!("{program} timed out after {}s", timeout.as_secs());
                return Err(CommandError::timeout(program, timeout));
            }
        };

        let result = CommandOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };

        debug!("{program} exit status: {:?}", result.code);
        trace!("{program} stdout: {}", result.stdout);
        if !result.stderr.is_empty() {
            trace!("{program} stderr: {}", result.stderr);
        }

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::{CommandError, CommandOutput, CommandRunner, HideWindow, SystemRunner};

    #[test]
    fn tokio_command_hide_window_is_chainable() {
        let mut cmd = tokio::process::Command::new("echo");
        let before = &raw mut cmd;
        let after = cmd.hide_window() as *mut tokio::process::Command;
        assert_eq!(before, after);
    }

    #[test]
    fn output_success_requires_zero_exit_code() {
        assert!(CommandOutput::ok("done").success());
        assert!(!CommandOutput::failed(1, "boom").success());
        assert!(
            !CommandOutput {
                code: None,
                ..CommandOutput::default()
            }
            .success()
        );
    }

    #[test]
    fn combined_lowercase_includes_both_streams() {
        let output = CommandOutput {
            code: Some(0),
            stdout: "Found Existing Package".to_string(),
            stderr: "No Applicable Update Found".to_string(),
        };
        let combined = output.combined_lowercase();
        assert!(combined.contains("found existing package"));
        assert!(combined.contains("no applicable update found"));
    }

    #[test]
    fn timeout_error_display_includes_seconds() {
        let error = CommandError::timeout("winget", Duration::from_secs(600));
        assert!(error.is_timeout());
        assert_eq!(error.to_string(), "winget timed out after 600s");
    }

    #[tokio::test]
    async fn system_runner_reports_missing_program() {
        let result = SystemRunner
            .run(
                "rebuild-definitely-missing-binary",
                &["--version"],
                Duration::from_secs(5),
            )
            .await;

        assert_eq!(
            result,
            Err(CommandError::not_found("rebuild-definitely-missing-binary"))
        );
    }
}
