//! Bounded subprocess execution.
//!
//! `CommandRunner` spawns `<program> <operation> <args...>`, captures both
//! output streams and enforces a timeout. It never returns an error: spawn
//! failures, timeouts and non-zero exits all come back as a failed
//! `CommandOutcome`, and the caller decides whether that is fatal.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;

/// Default timeout for one external operation.
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(300);

/// Result of one external operation.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CommandOutcome {
    pub succeeded: bool,
    pub output: String,
    pub error: String,
}

impl CommandOutcome {
    pub fn success(output: impl Into<String>) -> Self {
        Self {
            succeeded: true,
            output: output.into(),
            error: String::new(),
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            succeeded: false,
            output: String::new(),
            error: error.into(),
        }
    }

    /// The most useful text to show a human: stderr if any, else stdout.
    pub fn diagnostic(&self) -> &str {
        if self.error.trim().is_empty() {
            self.output.trim()
        } else {
            self.error.trim()
        }
    }
}

/// Runs operations of one external program (e.g. `git`).
#[derive(Debug, Clone)]
pub struct CommandRunner {
    program: String,
}

impl CommandRunner {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Run `<program> <operation> <args...>` in `working_dir`.
    ///
    /// The child is killed if it outlives `limit`.
    pub async fn run(
        &self,
        operation: &str,
        args: &[&str],
        working_dir: &Path,
        limit: Duration,
    ) -> CommandOutcome {
        let command_line = format!("{} {} {}", self.program, operation, args.join(" "));
        let command_line = command_line.trim_end();
        tracing::debug!(command = %command_line, dir = %working_dir.display(), "running command");

        let child = Command::new(&self.program)
            .arg(operation)
            .args(args)
            .current_dir(working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn();

        let child = match child {
            Ok(child) => child,
            Err(e) => {
                return CommandOutcome::failure(format!("Failed to spawn '{}': {}", command_line, e));
            }
        };

        let output = match timeout(limit, child.wait_with_output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                return CommandOutcome::failure(format!("Failed to wait for '{}': {}", command_line, e));
            }
            Err(_) => {
                return CommandOutcome::failure(format!(
                    "'{}' timed out after {} seconds",
                    command_line,
                    limit.as_secs()
                ));
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();

        if output.status.success() {
            CommandOutcome {
                succeeded: true,
                output: stdout,
                error: stderr,
            }
        } else {
            let code = output.status.code().unwrap_or(-1);
            // git reports some refusals ("nothing to commit") on stdout
            let detail = if stderr.trim().is_empty() {
                stdout.trim()
            } else {
                stderr.trim()
            };
            let error = if detail.is_empty() {
                format!("'{}' exited with code {}", command_line, code)
            } else {
                format!("'{}' exited with code {}: {}", command_line, code, detail)
            };
            CommandOutcome {
                succeeded: false,
                output: stdout,
                error,
            }
        }
    }
}
