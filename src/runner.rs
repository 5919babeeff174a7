/// Benchmark run loop: execute each combination in plan order, classify the
/// outcome, and append exactly one result row per attempted combination.
use crate::config::RunnerConfig;
use crate::extract::{clean_diagnostics, extract};
use crate::plan::RunCombination;
use crate::results::{ResultRow, ResultWriter, ResultsError, RunStatus};
use crate::session::{run_session, SessionError, SessionOutcome};
use std::time::Duration;

const RED: &str = "\x1b[0;31m";
const GREEN: &str = "\x1b[0;32m";
const YELLOW: &str = "\x1b[0;33m";
const NC: &str = "\x1b[0m";

/// Settings shared by every combination of a run.
#[derive(Debug, Clone)]
pub struct RunSettings {
    pub runner: RunnerConfig,
    pub prompt: String,
    pub timeout: Duration,
    /// Suppress per-combination banners.
    pub quiet: bool,
}

/// Whether the loop continues after a combination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Halt,
}

/// What happened over a whole run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub planned: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// The model CLI was missing; remaining combinations were not attempted.
    pub aborted: bool,
    /// The operator stopped the run at a setup pause.
    pub cancelled: bool,
}

impl RunSummary {
    pub fn attempted(&self) -> usize {
        self.succeeded + self.failed
    }
}

/// Last non-empty line of the diagnostic stream, used as the failure message.
fn last_error_line(stderr: &str) -> Option<String> {
    clean_diagnostics(stderr)
        .lines()
        .map(str::trim)
        .rfind(|line| !line.is_empty())
        .map(str::to_string)
}

/// Turn an invocation outcome into a result row and a loop decision.
fn classify(
    combination: &RunCombination,
    command: &str,
    outcome: Result<SessionOutcome, SessionError>,
) -> (ResultRow, Flow) {
    match outcome {
        Ok(SessionOutcome::Completed(result)) if result.exit_code == Some(0) => {
            let metrics = extract(&result.stderr);
            tracing::debug!(
                pid = result.pid,
                wall_secs = result.duration.as_secs_f64(),
                stdout_bytes = result.stdout_bytes,
                populated = metrics.populated(),
                "classified as success"
            );
            if metrics.populated() == 0 {
                tracing::warn!(
                    model = %combination.model,
                    "run succeeded but no metrics were found in stderr"
                );
            }
            (ResultRow::success(combination, metrics), Flow::Continue)
        }
        Ok(SessionOutcome::Completed(result)) => {
            let message = last_error_line(&result.stderr).unwrap_or_else(|| {
                match result.exit_code {
                    Some(code) => format!("process exited with status {code}"),
                    None => "process terminated by signal".to_string(),
                }
            });
            (ResultRow::failure(combination, message), Flow::Continue)
        }
        Ok(SessionOutcome::TimedOut { pid, timeout }) => {
            tracing::debug!(pid, model = %combination.model, "classified as timeout");
            let message = format!("timed out after {}s", timeout.as_secs());
            (ResultRow::failure(combination, message), Flow::Continue)
        }
        Err(e) if e.is_not_found() => {
            tracing::error!(command, "model CLI not found, stopping run");
            (
                ResultRow::failure(combination, format!("command not found: {command}")),
                Flow::Halt,
            )
        }
        Err(e) => {
            tracing::error!(error = %e, model = %combination.model, "model session failed");
            (ResultRow::failure(combination, e.to_string()), Flow::Continue)
        }
    }
}

/// Run every combination in order, writing one row each.
///
/// `ready` is consulted before each combination; returning `false` stops the
/// run without writing a row for that combination. Only result-file errors are
/// returned; everything that goes wrong with a single invocation is recorded
/// in its row.
pub async fn run_benchmark<F>(
    settings: &RunSettings,
    plan: &[RunCombination],
    writer: &mut ResultWriter,
    mut ready: F,
) -> Result<RunSummary, ResultsError>
where
    F: FnMut(&RunCombination) -> bool,
{
    let mut summary = RunSummary {
        planned: plan.len(),
        ..Default::default()
    };

    for combination in plan {
        if !ready(combination) {
            tracing::info!(position = combination.position, "run stopped by operator");
            summary.cancelled = true;
            break;
        }

        if !settings.quiet {
            println!();
            println!("{YELLOW}{combination}{NC}");
        }
        tracing::debug!(
            position = combination.position,
            total = combination.total,
            model = %combination.model,
            power_mode = %combination.power_mode,
            swap = %combination.swap,
            "starting combination"
        );

        let outcome = run_session(
            &settings.runner,
            &combination.model,
            &settings.prompt,
            settings.timeout,
        )
        .await;
        let (row, flow) = classify(combination, &settings.runner.command, outcome);
        writer.append(&row)?;

        match row.status {
            RunStatus::Success => {
                summary.succeeded += 1;
                if !settings.quiet {
                    let rate = row
                        .eval_rate_tps
                        .map(|r| format!("{r:.2} tokens/s"))
                        .unwrap_or_else(|| "no eval rate".to_string());
                    println!(
                        "{GREEN}--> success: {rate}, {}/8 metrics captured{NC}",
                        row.metrics().populated()
                    );
                }
            }
            RunStatus::Failure => {
                summary.failed += 1;
                eprintln!("{RED}--> failure: {} ({}){NC}", row.error_message, combination);
            }
        }

        if flow == Flow::Halt {
            summary.aborted = true;
            break;
        }
    }

    tracing::info!(
        planned = summary.planned,
        succeeded = summary.succeeded,
        failed = summary.failed,
        aborted = summary.aborted,
        cancelled = summary.cancelled,
        rows = writer.rows_written(),
        "benchmark run finished"
    );
    Ok(summary)
}
