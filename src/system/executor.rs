// src/system/executor.rs

use crate::CancellationToken;
use scopeguard::ScopeGuard;
use std::io::{self, ErrorKind, Read, Write};
use std::path::Path;
use std::process::{Child, Command as StdCommand, ExitStatus, Stdio};
use std::sync::atomic::Ordering;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use thiserror::Error;

const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Why an external command could not be run to completion.
#[derive(Error, Debug)]
pub enum ExecutionError {
    /// The argv was empty.
    #[error("No command specified to run.")]
    EmptyCommand,
    /// The program could not be started (not found, not executable, bad cwd).
    #[error("Command '{command}' could not be executed: {source}")]
    SpawnFailed {
        /// The command line, shell-quoted.
        command: String,
        /// The underlying I/O error.
        #[source]
        source: io::Error,
    },
    /// Waiting on the child or one of its pipes failed.
    #[error("I/O error while running '{command}': {source}")]
    Io {
        /// The command line, shell-quoted.
        command: String,
        /// The underlying I/O error.
        #[source]
        source: io::Error,
    },
    /// The child outlived its time limit and was killed.
    #[error("Command '{command}' timed out after {timeout:?}.")]
    TimedOut {
        /// The command line, shell-quoted.
        command: String,
        /// The limit that expired.
        timeout: Duration,
    },
    /// Ctrl+C was pressed while the child ran, or the child died of SIGINT.
    #[error("Command '{command}' was interrupted.")]
    Interrupted {
        /// The command line, shell-quoted.
        command: String,
    },
}

/// The raw result of a finished process.
#[derive(Debug)]
pub struct CapturedOutput {
    /// How the process exited.
    pub status: ExitStatus,
    /// Everything it wrote to stdout.
    pub stdout: Vec<u8>,
    /// Everything it wrote to stderr.
    pub stderr: Vec<u8>,
    /// Wall-clock time from spawn to exit.
    pub elapsed: Duration,
}

#[cfg(unix)]
fn killed_by_sigint(status: ExitStatus) -> bool {
    use std::os::unix::process::ExitStatusExt;
    // SIGINT can reach the child before the Ctrl+C handler has set the token.
    status.signal() == Some(2)
}

#[cfg(not(unix))]
fn killed_by_sigint(_status: ExitStatus) -> bool {
    false
}

/// Returns `true` once Ctrl+C has been pressed.
pub fn is_cancelled(cancellation_token: &CancellationToken) -> bool {
    cancellation_token.load(Ordering::SeqCst)
}

/// Renders an argv as a copy-pasteable shell line, for messages and logs.
pub fn display_command(argv: &[String]) -> String {
    shlex::try_join(argv.iter().map(String::as_str)).unwrap_or_else(|_| argv.join(" "))
}

/// Runs `argv` to completion in `cwd`, optionally feeding `stdin`, and captures both
/// output streams.
///
/// The child is polled rather than waited on so that a Ctrl+C (through
/// `cancellation_token`) or an expired `timeout` can kill it. A non-zero exit status
/// is *not* an error here; callers decide what it means. A child that dies while
/// cancellation is pending is reported as `Interrupted`, since the terminal delivers
/// SIGINT to the whole process group.
pub fn run_captured(
    argv: &[String],
    cwd: &Path,
    stdin: Option<&[u8]>,
    timeout: Option<Duration>,
    cancellation_token: &CancellationToken,
) -> Result<CapturedOutput, ExecutionError> {
    let (program, args) = argv.split_first().ok_or(ExecutionError::EmptyCommand)?;
    let command_line = display_command(argv);

    if is_cancelled(cancellation_token) {
        return Err(ExecutionError::Interrupted {
            command: command_line,
        });
    }

    let clean_cwd = dunce::simplified(cwd);
    log::debug!("Spawning '{}' in '{}'", command_line, clean_cwd.display());

    let mut command = StdCommand::new(program);
    command
        .args(args)
        .current_dir(clean_cwd)
        .stdin(if stdin.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    let started = Instant::now();
    let child = command.spawn().map_err(|e| ExecutionError::SpawnFailed {
        command: command_line.clone(),
        source: e,
    })?;

    // Whatever happens below, never leave a running child behind.
    let mut child = scopeguard::guard(child, |mut child| {
        if let Ok(None) = child.try_wait() {
            log::debug!("Killing child process (PID: {})...", child.id());
            if let Err(e) = child.kill() {
                log::warn!("Failed to kill child process {}: {}", child.id(), e);
            }
            child.wait().ok();
        }
    });

    let writer = spawn_writer(&mut child, stdin);
    let stdout_reader = spawn_reader(child.stdout.take());
    let stderr_reader = spawn_reader(child.stderr.take());

    let status = wait_with_deadline(&mut child, &command_line, timeout, cancellation_token)?;
    let elapsed = started.elapsed();
    // The process is gone; release it without running the kill guard.
    let _ = ScopeGuard::into_inner(child);

    if !status.success() && (is_cancelled(cancellation_token) || killed_by_sigint(status)) {
        return Err(ExecutionError::Interrupted {
            command: command_line,
        });
    }

    if let Some(writer) = writer {
        match join_pipe(writer, &command_line)? {
            Err(e) if e.kind() == ErrorKind::BrokenPipe => {
                log::debug!("'{}' exited before consuming all of its stdin", command_line);
            }
            Err(e) => {
                return Err(ExecutionError::Io {
                    command: command_line,
                    source: e,
                });
            }
            Ok(()) => {}
        }
    }

    let stdout = join_pipe(stdout_reader, &command_line)?.map_err(|e| ExecutionError::Io {
        command: command_line.clone(),
        source: e,
    })?;
    let stderr = join_pipe(stderr_reader, &command_line)?.map_err(|e| ExecutionError::Io {
        command: command_line.clone(),
        source: e,
    })?;

    log::trace!(
        "'{}' finished with {} in {:?} ({} bytes stdout, {} bytes stderr)",
        command_line,
        status,
        elapsed,
        stdout.len(),
        stderr.len()
    );

    Ok(CapturedOutput {
        status,
        stdout,
        stderr,
        elapsed,
    })
}

/// Non-blocking wait loop to allow for cancellation and timeouts.
fn wait_with_deadline(
    child: &mut Child,
    command_line: &str,
    timeout: Option<Duration>,
    cancellation_token: &CancellationToken,
) -> Result<ExitStatus, ExecutionError> {
    let deadline = timeout.map(|t| (Instant::now() + t, t));
    loop {
        match child.try_wait() {
            Ok(Some(status)) => return Ok(status),
            Ok(None) => {
                if is_cancelled(cancellation_token) {
                    log::debug!("Cancellation requested while '{}' was running.", command_line);
                    return Err(ExecutionError::Interrupted {
                        command: command_line.to_string(),
                    });
                }
                if let Some((deadline, limit)) = deadline
                    && Instant::now() >= deadline
                {
                    return Err(ExecutionError::TimedOut {
                        command: command_line.to_string(),
                        timeout: limit,
                    });
                }
                thread::sleep(POLL_INTERVAL);
            }
            Err(e) => {
                return Err(ExecutionError::Io {
                    command: command_line.to_string(),
                    source: e,
                });
            }
        }
    }
}

/// Feeds `input` to the child's stdin on a helper thread and closes it afterwards.
fn spawn_writer(child: &mut Child, input: Option<&[u8]>) -> Option<JoinHandle<io::Result<()>>> {
    let input = input?.to_vec();
    let mut pipe = child.stdin.take()?;
    Some(thread::spawn(move || {
        pipe.write_all(&input)?;
        pipe.flush()
    }))
}

/// Drains a pipe on a helper thread so a chatty child can never block on a full buffer.
fn spawn_reader<R: Read + Send + 'static>(pipe: Option<R>) -> JoinHandle<io::Result<Vec<u8>>> {
    thread::spawn(move || {
        let mut buffer = Vec::new();
        if let Some(mut pipe) = pipe {
            pipe.read_to_end(&mut buffer)?;
        }
        Ok(buffer)
    })
}

fn join_pipe<T>(
    handle: JoinHandle<io::Result<T>>,
    command_line: &str,
) -> Result<io::Result<T>, ExecutionError> {
    handle.join().map_err(|_| ExecutionError::Io {
        command: command_line.to_string(),
        source: io::Error::other("pipe thread panicked"),
    })
}
