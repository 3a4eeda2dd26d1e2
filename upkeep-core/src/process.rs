//! Bounded subprocess execution.
//!
//! Every external command the updater runs goes through one of two entry
//! points, both of which poll the child against a deadline and kill + reap it
//! on expiry:
//!
//! - [`run_captured`] pipes stdout/stderr into memory (drained on helper
//!   threads so a chatty child cannot fill the pipe and stall).
//! - [`run_logged`] sends stdout and stderr into one log file.
//!
//! A timeout is reported as [`ProcessError::Timeout`]; a non-zero exit is not
//! an error here and is left to the caller to interpret.

use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::error::ProcessError;

const POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Captured result of a finished command.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.status.success()
    }

    pub fn code(&self) -> Option<i32> {
        self.status.code()
    }
}

/// Human-readable command line, used in log lines and error messages.
pub fn describe(cmd: &Command) -> String {
    let mut line = cmd.get_program().to_string_lossy().into_owned();
    for arg in cmd.get_args() {
        line.push(' ');
        line.push_str(&arg.to_string_lossy());
    }
    line
}

/// Run `cmd` with piped output, killing it if it outlives `timeout`.
pub fn run_captured(cmd: &mut Command, timeout: Duration) -> Result<CommandOutput, ProcessError> {
    let program = describe(cmd);
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    let mut child = cmd.spawn().map_err(|source| ProcessError::Spawn {
        program: program.clone(),
        source,
    })?;
    let stdout = child.stdout.take().map(drain);
    let stderr = child.stderr.take().map(drain);

    // On timeout the reader threads are left detached: a grandchild may still
    // hold the pipe open.
    let status = wait_with_deadline(&mut child, &program, timeout)?;

    Ok(CommandOutput {
        status,
        stdout: collect(stdout),
        stderr: collect(stderr),
    })
}

/// Run `cmd` with stdout and stderr both written to `log_path` (truncated first).
pub fn run_logged(
    cmd: &mut Command,
    log_path: &Path,
    timeout: Duration,
) -> Result<ExitStatus, ProcessError> {
    let program = describe(cmd);
    let io = |source| ProcessError::Io {
        program: program.clone(),
        source,
    };

    if let Some(parent) = log_path.parent() {
        std::fs::create_dir_all(parent).map_err(io)?;
    }
    let log = File::create(log_path).map_err(io)?;
    let log_err = log.try_clone().map_err(io)?;

    cmd.stdin(Stdio::null())
        .stdout(Stdio::from(log))
        .stderr(Stdio::from(log_err));

    let mut child = cmd.spawn().map_err(|source| ProcessError::Spawn {
        program: program.clone(),
        source,
    })?;
    wait_with_deadline(&mut child, &program, timeout)
}

fn wait_with_deadline(
    child: &mut Child,
    program: &str,
    timeout: Duration,
) -> Result<ExitStatus, ProcessError> {
    let deadline = Instant::now() + timeout;
    loop {
        match child.try_wait() {
            Ok(Some(status)) => return Ok(status),
            Ok(None) if Instant::now() >= deadline => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(ProcessError::Timeout {
                    program: program.to_string(),
                    timeout,
                });
            }
            Ok(None) => thread::sleep(POLL_INTERVAL),
            Err(source) => {
                let _ = child.kill();
                return Err(ProcessError::Io {
                    program: program.to_string(),
                    source,
                });
            }
        }
    }
}

fn drain<R: Read + Send + 'static>(mut pipe: R) -> JoinHandle<String> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = pipe.read_to_end(&mut buf);
        String::from_utf8_lossy(&buf).into_owned()
    })
}

fn collect(handle: Option<JoinHandle<String>>) -> String {
    handle
        .and_then(|h| h.join().ok())
        .unwrap_or_default()
}
