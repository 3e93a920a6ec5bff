//! External process execution
//!
//! Output pipes are drained on helper threads while the child is polled
//! with `try_wait`. With a timeout, a child still running at the deadline is
//! killed; data transfers run to completion instead.

use std::ffi::OsStr;
use std::io::{BufRead, BufReader, Read};
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Outcome of an external process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessResult {
    /// Exit code, `None` if the process did not exit normally
    pub exit_code: Option<i32>,
    /// Standard output split into lines
    pub stdout_lines: Vec<String>,
    /// Standard error split into lines
    pub stderr_lines: Vec<String>,
    /// Set when the process could not be started or timed out
    pub failure: Option<String>,
}

impl ProcessResult {
    /// Result of a process that exited with `exit_code`.
    pub fn exited(exit_code: i32, stdout_lines: Vec<String>, stderr_lines: Vec<String>) -> Self {
        ProcessResult {
            exit_code: Some(exit_code),
            stdout_lines,
            stderr_lines,
            failure: None,
        }
    }

    /// Result of a process that never produced an exit code.
    pub fn failed(message: impl Into<String>) -> Self {
        ProcessResult {
            failure: Some(message.into()),
            ..Default::default()
        }
    }

    /// Whether the process exited with code zero.
    pub fn is_ok(&self) -> bool {
        self.failure.is_none() && self.exit_code == Some(0)
    }

    /// Human-readable reason for a failure.
    pub fn error_message(&self) -> String {
        if let Some(failure) = &self.failure {
            return failure.clone();
        }
        let stderr = self.stderr_lines.join("\n");
        match self.exit_code {
            Some(code) if stderr.is_empty() => format!("exit code {}", code),
            Some(code) => format!("exit code {}: {}", code, stderr),
            None => "terminated by signal".to_string(),
        }
    }
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> Option<thread::JoinHandle<Vec<String>>> {
    pipe.map(|pipe| {
        thread::spawn(move || {
            BufReader::new(pipe)
                .lines()
                .map_while(Result::ok)
                .collect()
        })
    })
}

/// Run `program` with `args`, killing it after `timeout`.
pub fn run_with_timeout<S: AsRef<OsStr>>(
    program: impl AsRef<OsStr>,
    args: &[S],
    timeout: Duration,
) -> ProcessResult {
    run(program.as_ref(), args, Some(timeout))
}

/// Run `program` with `args` until it exits, however long that takes.
pub fn run_to_completion<S: AsRef<OsStr>>(
    program: impl AsRef<OsStr>,
    args: &[S],
) -> ProcessResult {
    run(program.as_ref(), args, None)
}

fn run<S: AsRef<OsStr>>(program: &OsStr, args: &[S], timeout: Option<Duration>) -> ProcessResult {
    let mut command = Command::new(program);
    command
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    let mut child = match command.spawn() {
        Ok(child) => child,
        Err(e) => {
            return ProcessResult::failed(format!(
                "cannot start '{}': {}",
                program.to_string_lossy(),
                e
            ))
        }
    };
    let stdout = drain(child.stdout.take());
    let stderr = drain(child.stderr.take());

    let deadline = timeout.map(|timeout| Instant::now() + timeout);
    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) if deadline.map_or(false, |at| Instant::now() >= at) => {
                let timeout = timeout.unwrap_or_default();
                let _ = child.kill();
                let _ = child.wait();
                warn!(program = %program.to_string_lossy(), ?timeout, "Process timed out and was killed");
                return ProcessResult::failed(format!(
                    "'{}' timed out after {} ms",
                    program.to_string_lossy(),
                    timeout.as_millis()
                ));
            }
            Ok(None) => thread::sleep(POLL_INTERVAL),
            Err(e) => {
                let _ = child.kill();
                return ProcessResult::failed(format!("waiting for process failed: {}", e));
            }
        }
    };

    let stdout_lines = stdout.and_then(|h| h.join().ok()).unwrap_or_default();
    let stderr_lines = stderr.and_then(|h| h.join().ok()).unwrap_or_default();
    debug!(program = %program.to_string_lossy(), code = ?status.code(), "Process finished");
    ProcessResult {
        exit_code: status.code(),
        stdout_lines,
        stderr_lines,
        failure: None,
    }
}
