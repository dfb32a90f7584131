//! Subprocess execution.
//!
//! Every external tool (package manager, service manager, hook tools) is run
//! through [`SubprocessBuilder`]:
//! - No shell interpretation (direct exec)
//! - Enforced timeouts
//! - Captured stdout/stderr
//! - Optional stdin payload

use std::collections::HashMap;
use std::io::{Read, Write};
use std::process::{Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::error::{CharmError, CommandErrorKind};

use super::output::sanitize_output;

/// Result of a subprocess execution.
#[derive(Debug, Clone)]
pub struct SubprocessResult {
    /// Whether the command exited successfully (exit code 0).
    pub success: bool,
    /// The exit code, if available.
    pub exit_code: Option<i32>,
    /// Captured stdout as a string.
    pub stdout: String,
    /// Captured stderr as a string.
    pub stderr: String,
}

impl SubprocessResult {
    fn from_parts(status: ExitStatus, stdout: &[u8], stderr: &[u8]) -> Self {
        Self {
            success: status.success(),
            exit_code: status.code(),
            stdout: String::from_utf8_lossy(stdout).to_string(),
            stderr: String::from_utf8_lossy(stderr).to_string(),
        }
    }
}

/// Read a pipe to the end on its own thread so the child never blocks on a
/// full pipe buffer.
fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> Option<JoinHandle<Vec<u8>>> {
    pipe.map(|mut pipe| {
        thread::spawn(move || {
            let mut buf = Vec::new();
            if let Err(e) = pipe.read_to_end(&mut buf) {
                debug!(error = %e, "Subprocess pipe closed with error");
            }
            buf
        })
    })
}

fn collect(reader: Option<JoinHandle<Vec<u8>>>) -> Vec<u8> {
    reader
        .map(|handle| handle.join().unwrap_or_default())
        .unwrap_or_default()
}

/// Builder for subprocess execution.
pub struct SubprocessBuilder {
    program: String,
    args: Vec<String>,
    env: HashMap<String, String>,
    stdin: Option<Vec<u8>>,
    timeout: Duration,
}

impl SubprocessBuilder {
    /// Create a new subprocess builder.
    pub fn new(program: &str) -> Self {
        Self {
            program: program.to_string(),
            args: Vec::new(),
            env: HashMap::new(),
            stdin: None,
            timeout: Duration::from_secs(60),
        }
    }

    /// Add arguments to the command.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.args.extend(args.into_iter().map(|s| s.as_ref().to_string()));
        self
    }

    /// Add a single argument.
    pub fn arg(mut self, arg: &str) -> Self {
        self.args.push(arg.to_string());
        self
    }

    /// Set an environment variable.
    pub fn env(mut self, key: &str, value: &str) -> Self {
        self.env.insert(key.to_string(), value.to_string());
        self
    }

    /// Feed `data` to the process on stdin.
    pub fn stdin(mut self, data: impl Into<Vec<u8>>) -> Self {
        self.stdin = Some(data.into());
        self
    }

    /// Set the timeout for the command.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Human-readable command line for error messages.
    fn display(&self) -> String {
        if self.args.is_empty() {
            self.program.clone()
        } else {
            format!("{} {}", self.program, self.args.join(" "))
        }
    }

    /// Execute the command and wait for completion with timeout enforcement.
    ///
    /// A non-zero exit is reported through [`SubprocessResult::success`],
    /// not as an error.
    pub fn run(self) -> Result<SubprocessResult, CharmError> {
        debug!(
            program = %self.program,
            args = ?self.args,
            timeout_secs = self.timeout.as_secs(),
            "Executing subprocess"
        );

        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        cmd.stdin(if self.stdin.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        });
        for (key, value) in &self.env {
            cmd.env(key, value);
        }

        let mut child = cmd.spawn().map_err(|e| {
            CharmError::command_failed(&self.program, format!("Failed to spawn: {}", e))
        })?;

        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        if let (Some(data), Some(mut pipe)) = (&self.stdin, child.stdin.take()) {
            if let Err(e) = pipe.write_all(data) {
                let _ = child.kill();
                let _ = child.wait();
                return Err(CharmError::command_failed(
                    &self.program,
                    format!("Failed to write stdin: {}", e),
                ));
            }
            // Dropping the pipe closes stdin.
        }

        let start = Instant::now();
        let poll_interval = Duration::from_millis(50);

        loop {
            match child.try_wait() {
                Ok(Some(status)) => {
                    let result = SubprocessResult::from_parts(status, &collect(stdout), &collect(stderr));
                    debug!(
                        success = result.success,
                        exit_code = ?result.exit_code,
                        duration_ms = start.elapsed().as_millis(),
                        "Subprocess completed"
                    );
                    return Ok(result);
                }
                Ok(None) => {
                    if start.elapsed() > self.timeout {
                        warn!(
                            program = %self.program,
                            timeout_secs = self.timeout.as_secs(),
                            "Process timed out, killing"
                        );
                        if let Err(e) = child.kill() {
                            warn!(error = %e, "Failed to kill timed-out process");
                        }
                        // Reap the zombie process. The reader threads are left
                        // to finish on their own: a grandchild may still hold
                        // the pipes open.
                        let _ = child.wait();
                        return Err(CharmError::Command {
                            program: self.program.clone(),
                            kind: CommandErrorKind::Timeout {
                                timeout_secs: self.timeout.as_secs(),
                            },
                        });
                    }
                    thread::sleep(poll_interval);
                }
                Err(e) => {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(CharmError::command_failed(
                        &self.program,
                        format!("Failed to check process status: {}", e),
                    ));
                }
            }
        }
    }

    /// Execute the command and fail on a non-zero exit.
    pub fn check(self) -> Result<SubprocessResult, CharmError> {
        let program = self.program.clone();
        let cmdline = self.display();
        let result = self.run()?;

        if !result.success {
            warn!(
                command = %cmdline,
                exit_code = ?result.exit_code,
                stderr = %result.stderr,
                "Subprocess failed"
            );
            return Err(CharmError::command_failed(
                &program,
                format!(
                    "'{}' exited with {}: {}",
                    cmdline,
                    result
                        .exit_code
                        .map(|c| c.to_string())
                        .unwrap_or_else(|| "signal".to_string()),
                    sanitize_output(&result.stderr, 5)
                ),
            ));
        }

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_echo() {
        let result = SubprocessBuilder::new("echo")
            .args(["hello", "world"])
            .timeout(Duration::from_secs(5))
            .run()
            .unwrap();
        assert!(result.success);
        assert_eq!(result.exit_code, Some(0));
        assert_eq!(result.stdout.trim(), "hello world");
    }

    #[test]
    fn test_run_false_command_is_not_an_error() {
        let result = SubprocessBuilder::new("false")
            .timeout(Duration::from_secs(5))
            .run()
            .unwrap();
        assert!(!result.success);
        assert_eq!(result.exit_code, Some(1));
    }

    #[test]
    fn test_check_false_command_fails() {
        let result = SubprocessBuilder::new("false")
            .timeout(Duration::from_secs(5))
            .check();
        match result {
            Err(CharmError::Command { program, kind }) => {
                assert_eq!(program, "false");
                assert!(matches!(kind, CommandErrorKind::ExecutionFailed { .. }));
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_run_with_env() {
        let result = SubprocessBuilder::new("sh")
            .args(["-c", "echo $TEST_VAR"])
            .env("TEST_VAR", "hello_env")
            .timeout(Duration::from_secs(5))
            .check()
            .unwrap();
        assert_eq!(result.stdout.trim(), "hello_env");
    }

    #[test]
    fn test_stdin_payload() {
        let result = SubprocessBuilder::new("cat")
            .stdin("piped input")
            .timeout(Duration::from_secs(5))
            .check()
            .unwrap();
        assert_eq!(result.stdout, "piped input");
    }

    #[test]
    fn test_nonexistent_command() {
        let result = SubprocessBuilder::new("nonexistent_command_12345")
            .timeout(Duration::from_secs(5))
            .check();
        assert!(result.is_err());
    }

    #[test]
    fn test_timeout_kills_process() {
        let result = SubprocessBuilder::new("sleep")
            .arg("5")
            .timeout(Duration::from_millis(200))
            .run();
        assert!(matches!(
            result,
            Err(CharmError::Command {
                kind: CommandErrorKind::Timeout { .. },
                ..
            })
        ));
    }

    #[test]
    fn test_output_larger_than_pipe_buffer() {
        let result = SubprocessBuilder::new("sh")
            .args(["-c", "head -c 200000 /dev/zero | tr '\\0' x; echo done >&2"])
            .timeout(Duration::from_secs(10))
            .check()
            .unwrap();
        assert_eq!(result.stdout.len(), 200_000);
        assert_eq!(result.stderr.trim(), "done");
    }

    #[test]
    fn test_display_joins_args() {
        let builder = SubprocessBuilder::new("open-port").arg("9103/tcp");
        assert_eq!(builder.display(), "open-port 9103/tcp");
    }
}
