/// Single invocation lifecycle: spawn the model CLI, capture its output,
/// enforce the wall-clock timeout, report the outcome.
use crate::config::RunnerConfig;
use nix::sys::signal::{killpg, Signal};
use nix::unistd::Pid;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::process::Command;

/// Result of an invocation that exited on its own.
#[derive(Debug)]
pub struct SessionResult {
    /// Process exit code (None if killed by signal).
    pub exit_code: Option<i32>,
    /// Captured diagnostic stream, lossily decoded.
    pub stderr: String,
    /// Bytes the model wrote to stdout (the response text, unused for metrics).
    pub stdout_bytes: usize,
    /// Wall-clock duration of the invocation.
    pub duration: Duration,
    /// Child PID (for logging/diagnostics).
    pub pid: u32,
}

/// How an invocation ended.
#[derive(Debug)]
pub enum SessionOutcome {
    Completed(SessionResult),
    /// The timeout expired and the process group was killed.
    TimedOut { pid: u32, timeout: Duration },
}

/// Errors that can occur during session execution.
#[derive(Debug)]
pub enum SessionError {
    /// Failed to spawn the model CLI.
    Spawn {
        command: String,
        source: std::io::Error,
    },
    /// Failed while waiting for the child or reading its output.
    Io { source: std::io::Error },
}

impl SessionError {
    /// True when the command itself could not be found.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            SessionError::Spawn { source, .. } if source.kind() == std::io::ErrorKind::NotFound
        )
    }
}

impl std::fmt::Display for SessionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionError::Spawn { command, source } => {
                write!(f, "failed to spawn {}: {}", command, source)
            }
            SessionError::Io { source } => {
                write!(f, "I/O error during session: {}", source)
            }
        }
    }
}

impl std::error::Error for SessionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SessionError::Spawn { source, .. } => Some(source),
            SessionError::Io { source } => Some(source),
        }
    }
}

/// Build the command arguments, replacing `{model}` and `{prompt}` placeholders.
fn build_args(runner: &RunnerConfig, model: &str, prompt: &str) -> Vec<String> {
    runner
        .args
        .iter()
        .map(|arg| arg.replace("{model}", model).replace("{prompt}", prompt))
        .collect()
}

/// Kill the whole process group so helpers spawned by the CLI die with it.
fn kill_process_group(pid: u32) {
    if pid == 0 {
        return;
    }
    if let Err(e) = killpg(Pid::from_raw(pid as i32), Signal::SIGKILL) {
        tracing::warn!(pid, error = %e, "failed to kill timed-out process group");
    }
}

/// Run one invocation of the model CLI for `model`, bounded by `timeout`.
///
/// The child runs in its own process group (via `process_group(0)`) with
/// stdin closed; stdout and stderr are captured separately.
pub async fn run_session(
    runner: &RunnerConfig,
    model: &str,
    prompt: &str,
    timeout: Duration,
) -> Result<SessionOutcome, SessionError> {
    let args = build_args(runner, model, prompt);
    tracing::info!(
        command = %runner.command,
        args = ?args,
        timeout_secs = timeout.as_secs(),
        "spawning model session"
    );

    let start = Instant::now();

    let child = Command::new(&runner.command)
        .args(&args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .process_group(0) // New process group for clean kill
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| SessionError::Spawn {
            command: runner.command.clone(),
            source: e,
        })?;

    let pid = child.id().unwrap_or(0);
    tracing::debug!(pid, "model subprocess started");

    let output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Ok(result) => result.map_err(|e| SessionError::Io { source: e })?,
        Err(_) => {
            kill_process_group(pid);
            tracing::warn!(pid, timeout_secs = timeout.as_secs(), "model session timed out");
            return Ok(SessionOutcome::TimedOut { pid, timeout });
        }
    };

    let duration = start.elapsed();
    let exit_code = output.status.code();
    tracing::info!(
        exit_code = ?exit_code,
        stderr_bytes = output.stderr.len(),
        stdout_bytes = output.stdout.len(),
        duration_secs = duration.as_secs_f64(),
        "model session completed"
    );

    Ok(SessionOutcome::Completed(SessionResult {
        exit_code,
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        stdout_bytes: output.stdout.len(),
        duration,
        pid,
    }))
}
