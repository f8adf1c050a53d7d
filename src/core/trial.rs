// src/core/trial.rs

use crate::{
    CancellationToken,
    constants::SUCCESS_MESSAGE,
    core::{pipeline::TrialPlan, verdict},
    models::{Stage, StageOutcome, TrialReport, Verdict},
    system::executor::{self, ExecutionError},
};
use colored::*;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Lines of stderr quoted in a `StageFailed` message. The full text stays in `stages`.
const STDERR_EXCERPT_LINES: usize = 5;

/// Why a trial did not pass.
#[derive(Error, Debug)]
pub enum TrialError {
    /// A stage exited unsuccessfully. Raised before the solver output is looked at.
    #[error("Stage '{stage}' failed with {status}.{stderr_excerpt}")]
    StageFailed {
        /// The stage that failed.
        stage: Stage,
        /// Its exit status, as printed by the OS (`exit status: 2`, `signal: 9`).
        status: String,
        /// The last few non-empty stderr lines, pre-indented.
        stderr_excerpt: String,
        /// Every stage that ran, the failing one last.
        stages: Vec<StageOutcome>,
    },
    /// Every stage succeeded but the solver output lacks the marker.
    #[error("Translation validation failed: {reason} (no '{marker}' in the solver output).")]
    ValidationFailed {
        /// The substring that was expected.
        marker: String,
        /// How the solver actually answered.
        verdict: Verdict,
        /// `verdict` in words.
        reason: &'static str,
        /// All five stages.
        stages: Vec<StageOutcome>,
    },
    /// A stage could not be run at all (spawn failure, timeout, Ctrl+C).
    #[error(transparent)]
    Execution(#[from] ExecutionError),
    /// An intermediate file from the previous trial could not be removed.
    #[error("Could not remove stale file '{}': {source}", .path.display())]
    StaleFile {
        /// The file that is still there.
        path: PathBuf,
        /// The underlying I/O error.
        source: io::Error,
    },
    /// The acknowledgment could not be printed.
    #[error("Could not write to stdout: {0}")]
    Output(#[source] io::Error),
}

impl TrialError {
    /// The stages that ran before the trial failed, if any were recorded.
    pub fn outcomes(&self) -> &[StageOutcome] {
        match self {
            Self::StageFailed { stages, .. } | Self::ValidationFailed { stages, .. } => stages,
            Self::Execution(_) | Self::StaleFile { .. } | Self::Output(_) => &[],
        }
    }

    /// The solver verdict, when the trial got that far.
    pub fn verdict(&self) -> Option<Verdict> {
        match self {
            Self::ValidationFailed { verdict, .. } => Some(*verdict),
            _ => None,
        }
    }
}

/// Runs one translation-validation trial.
///
/// Every stage must exit successfully; the first one that does not aborts the trial with
/// `StageFailed`. Only then is the solver output checked for the marker, failing with
/// `ValidationFailed` if it is missing. On success the acknowledgment is written to `out`.
pub fn run_once<W: Write + ?Sized>(
    plan: &TrialPlan,
    cancellation_token: &CancellationToken,
    out: &mut W,
) -> Result<TrialReport, TrialError> {
    // Leftovers from the previous trial must never be mistaken for this trial's files.
    for stale in [plan.pre_path(), plan.post_path()] {
        remove_stale(&stale)?;
    }

    let mut stages = Vec::with_capacity(plan.stages.len());
    let mut previous_stdout: Vec<u8> = Vec::new();

    for stage_plan in &plan.stages {
        let stdin = stage_plan.piped_stdin.then_some(previous_stdout.as_slice());
        let captured = executor::run_captured(
            &stage_plan.argv,
            &plan.work_dir,
            stdin,
            plan.timeout,
            cancellation_token,
        )?;

        log::debug!(
            "Stage '{}' finished with {} in {:?}",
            stage_plan.stage,
            captured.status,
            captured.elapsed
        );

        let outcome = StageOutcome {
            stage: stage_plan.stage,
            argv: stage_plan.argv.clone(),
            exit_code: captured.status.code(),
            stdout: String::from_utf8_lossy(&captured.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&captured.stderr).into_owned(),
            duration: captured.elapsed,
        };

        if !captured.status.success() {
            let stderr_excerpt = excerpt(&outcome.stderr);
            stages.push(outcome);
            return Err(TrialError::StageFailed {
                stage: stage_plan.stage,
                status: captured.status.to_string(),
                stderr_excerpt,
                stages,
            });
        }

        stages.push(outcome);
        previous_stdout = captured.stdout;
    }

    let (verdict, passed) = {
        let solver_stdout = stages.last().map(|o| o.stdout.as_str()).unwrap_or_default();
        (
            Verdict::classify(solver_stdout),
            verdict::passes(solver_stdout, &plan.marker),
        )
    };

    if !passed {
        return Err(TrialError::ValidationFailed {
            marker: plan.marker.clone(),
            verdict,
            reason: verdict.describe(),
            stages,
        });
    }

    writeln!(out, "{}", SUCCESS_MESSAGE.green()).map_err(TrialError::Output)?;
    Ok(TrialReport { stages, verdict })
}

fn remove_stale(path: &Path) -> Result<(), TrialError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(TrialError::StaleFile {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}

/// The tail of a stderr dump, indented for display under the error line.
fn excerpt(stderr: &str) -> String {
    let lines: Vec<&str> = stderr.lines().filter(|l| !l.trim().is_empty()).collect();
    let tail = lines.len().saturating_sub(STDERR_EXCERPT_LINES);
    lines
        .iter()
        .skip(tail)
        .map(|line| format!("\n    {}", line))
        .collect()
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::models::{RunSettings, StageCommand, Toolchain};
    use std::sync::Arc;
    use std::sync::atomic::AtomicBool;
    use tempfile::TempDir;

    /// Stand-ins for the real tools. `$0`/`$1` receive the substituted placeholders.
    fn fake_tools(solve_script: &str) -> Toolchain {
        Toolchain {
            enumerate: StageCommand::new("sh", &["-c", "echo \"program from $0\"", "{dialect}"]),
            print_generic: StageCommand::new("sh", &["-c", "cat > \"$0\"", "{pre}"]),
            canonicalize: StageCommand::new("sh", &["-c", "cp \"$0\" \"$1\"", "{pre}", "{post}"]),
            validate: StageCommand::new(
                "sh",
                &["-c", "cat \"$0\" \"$1\"; echo '(check-sat)'", "{pre}", "{post}"],
            ),
            solve: StageCommand::new("sh", &["-c", solve_script]),
        }
    }

    fn plan_in(dir: &Path, tools: Toolchain) -> TrialPlan {
        TrialPlan::from_settings(&RunSettings {
            tools,
            dialect: PathBuf::from("arith.mlir"),
            pre_file: PathBuf::from("test1.mlir"),
            post_file: PathBuf::from("test2.mlir"),
            marker: "unsat".to_string(),
            iterations: None,
            timeout: None,
            work_dir: dir.to_path_buf(),
            failures_dir: None,
            quiet: false,
        })
    }

    fn token() -> CancellationToken {
        Arc::new(AtomicBool::new(false))
    }

    #[test]
    fn test_passing_trial_prints_nice() {
        let dir = TempDir::new().unwrap();
        let plan = plan_in(dir.path(), fake_tools("grep -q check-sat && echo unsat"));
        let mut out = Vec::new();

        let report = run_once(&plan, &token(), &mut out).unwrap();

        assert_eq!(report.verdict, Verdict::Unsat);
        assert_eq!(report.stages.len(), 5);
        assert!(String::from_utf8(out).unwrap().contains("nice"));
        let pre = fs::read_to_string(dir.path().join("test1.mlir")).unwrap();
        assert_eq!(pre.trim(), "program from arith.mlir");
        assert_eq!(
            fs::read_to_string(dir.path().join("test2.mlir")).unwrap(),
            pre
        );
    }

    #[test]
    fn test_sat_is_a_validation_failure() {
        let dir = TempDir::new().unwrap();
        let plan = plan_in(dir.path(), fake_tools("cat > /dev/null; echo sat"));
        let mut out = Vec::new();

        let err = run_once(&plan, &token(), &mut out).unwrap_err();

        assert!(matches!(
            err,
            TrialError::ValidationFailed {
                verdict: Verdict::Sat,
                ..
            }
        ));
        assert_eq!(err.outcomes().len(), 5);
        assert!(out.is_empty());
    }

    #[test]
    fn test_empty_solver_output_is_a_validation_failure() {
        let dir = TempDir::new().unwrap();
        let plan = plan_in(dir.path(), fake_tools("cat > /dev/null"));

        let err = run_once(&plan, &token(), &mut Vec::new()).unwrap_err();

        assert_eq!(err.verdict(), Some(Verdict::Unrecognized));
    }

    #[test]
    fn test_failing_stage_stops_the_trial() {
        let dir = TempDir::new().unwrap();
        let mut tools = fake_tools("echo unsat");
        tools.canonicalize = StageCommand::new("sh", &["-c", "echo 'bad rewrite' >&2; exit 2"]);
        let plan = plan_in(dir.path(), tools);

        let err = run_once(&plan, &token(), &mut Vec::new()).unwrap_err();

        match &err {
            TrialError::StageFailed {
                stage,
                stderr_excerpt,
                stages,
                ..
            } => {
                assert_eq!(*stage, Stage::Canonicalize);
                assert!(stderr_excerpt.contains("bad rewrite"));
                assert_eq!(stages.len(), 3);
                assert_eq!(stages.last().unwrap().exit_code, Some(2));
            }
            other => panic!("Expected StageFailed, got {:?}", other),
        }
    }

    #[test]
    fn test_exit_status_is_checked_before_output() {
        let dir = TempDir::new().unwrap();
        let plan = plan_in(dir.path(), fake_tools("echo unsat; exit 1"));
        let mut out = Vec::new();

        let err = run_once(&plan, &token(), &mut out).unwrap_err();

        assert!(matches!(
            err,
            TrialError::StageFailed {
                stage: Stage::Solve,
                ..
            }
        ));
        assert!(out.is_empty());
    }

    #[test]
    fn test_intermediate_files_are_overwritten() {
        let dir = TempDir::new().unwrap();
        let plan = plan_in(dir.path(), fake_tools("echo unsat"));

        run_once(&plan, &token(), &mut Vec::new()).unwrap();
        run_once(&plan, &token(), &mut Vec::new()).unwrap();

        let pre = fs::read_to_string(dir.path().join("test1.mlir")).unwrap();
        assert_eq!(pre.lines().count(), 1);
        let entries = fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(entries, 2);
    }

    #[test]
    fn test_failed_trial_leaves_no_previous_program_behind() {
        let dir = TempDir::new().unwrap();
        let plan = plan_in(dir.path(), fake_tools("echo unsat"));
        run_once(&plan, &token(), &mut Vec::new()).unwrap();
        assert!(dir.path().join("test1.mlir").is_file());

        let mut tools = fake_tools("echo unsat");
        tools.enumerate = StageCommand::new("sh", &["-c", "exit 1"]);
        let failing = plan_in(dir.path(), tools);
        let err = run_once(&failing, &token(), &mut Vec::new()).unwrap_err();

        assert!(matches!(err, TrialError::StageFailed { stage: Stage::Enumerate, .. }));
        assert!(!dir.path().join("test1.mlir").exists());
        assert!(!dir.path().join("test2.mlir").exists());
    }

    #[test]
    fn test_excerpt_keeps_the_tail() {
        let stderr = "1\n2\n\n3\n4\n5\n6\n7\n";
        assert_eq!(excerpt(stderr), "\n    3\n    4\n    5\n    6\n    7");
        assert_eq!(excerpt(""), "");
    }
}
