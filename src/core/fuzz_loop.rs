// src/core/fuzz_loop.rs

use crate::{
    CancellationToken,
    core::{
        pipeline::TrialPlan,
        reproducer,
        trial::{self, TrialError},
    },
    models::{RunSettings, RunSummary, StopReason},
    system::executor::{self, ExecutionError},
};
use anyhow::{Error, Result};
use colored::*;
use std::io::Write;
use std::time::Instant;

/// Runs trials until one fails, the iteration limit is reached, or Ctrl+C is pressed.
///
/// A failing trial is fatal: its inputs are preserved (when a failures directory is
/// configured) and the error is returned. There is no retry.
pub fn run<W: Write + ?Sized>(
    settings: &RunSettings,
    cancellation_token: &CancellationToken,
    out: &mut W,
) -> Result<RunSummary> {
    let plan = TrialPlan::from_settings(settings);
    let started = Instant::now();
    let mut passed: u64 = 0;

    log::info!(
        "Fuzzing in '{}' ({})",
        plan.work_dir.display(),
        match settings.iterations {
            Some(limit) => format!("{} trial(s)", limit),
            None => "until failure".to_string(),
        }
    );
    if log::log_enabled!(log::Level::Debug) {
        for stage in &plan.stages {
            log::debug!("  {:<13} {}", stage.stage, executor::display_command(&stage.argv));
        }
    }

    let stop = loop {
        if executor::is_cancelled(cancellation_token) {
            break StopReason::Cancelled;
        }
        if settings.iterations.is_some_and(|limit| passed >= limit) {
            break StopReason::IterationLimit;
        }

        let iteration = passed + 1;
        let trial_started = Instant::now();
        match trial::run_once(&plan, cancellation_token, &mut *out) {
            Ok(report) => {
                passed += 1;
                log::debug!(
                    "Trial #{} passed ({:?}) in {:?}",
                    iteration,
                    report.verdict,
                    trial_started.elapsed()
                );
            }
            Err(TrialError::Execution(e)) => {
                return Err(Error::new(e).context(format!("Trial #{} could not run", iteration)));
            }
            Err(e) => {
                if let Some(failures_dir) = &settings.failures_dir {
                    match reproducer::preserve(failures_dir, &plan, iteration, &e) {
                        Ok(dir) => eprintln!(
                            "{} {}",
                            "Failing input preserved in".yellow(),
                            dir.display()
                        ),
                        Err(save_err) => {
                            log::warn!("Could not preserve the failing trial: {:#}", save_err);
                        }
                    }
                }
                return Err(Error::new(e).context(format!(
                    "Trial #{} failed after {} passing trial(s)",
                    iteration, passed
                )));
            }
        }
    };

    Ok(RunSummary {
        passed,
        elapsed: started.elapsed(),
        stop,
    })
}

/// Returns `true` if `error` was caused by Ctrl+C interrupting a running stage.
pub fn is_interrupted(error: &Error) -> bool {
    error.chain().any(|cause| {
        matches!(
            cause.downcast_ref::<ExecutionError>(),
            Some(ExecutionError::Interrupted { .. })
        )
    })
}
