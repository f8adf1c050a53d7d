// src/core/reproducer.rs

use crate::{
    constants::{REPORT_FILENAME, REPRODUCER_HASH_BYTES},
    core::{pipeline::TrialPlan, trial::TrialError},
    models::{StageOutcome, Verdict},
};
use anyhow::{Context, Result};
use log::debug;
use serde::Serialize;
use std::{
    fs,
    path::{Path, PathBuf},
};

/// The `report.json` written next to a preserved failing input.
#[derive(Serialize, Debug)]
struct FailureReport<'a> {
    iteration: u64,
    error: String,
    verdict: Option<Verdict>,
    stages: &'a [StageOutcome],
}

/// Copies the intermediate files of a failed trial into `<failures_dir>/<hash>/`, along
/// with a JSON report of every stage that ran.
///
/// `<hash>` is a truncated blake3 hash of the pre-canonicalization program, so the same
/// failing program found twice lands in the same directory.
///
/// # Errors
/// Returns an I/O error if the directory cannot be created or the files cannot be written.
pub fn preserve(
    failures_dir: &Path,
    plan: &TrialPlan,
    iteration: u64,
    error: &TrialError,
) -> Result<PathBuf> {
    let pre_path = plan.pre_path();
    // The trial may have failed before the enumerator produced anything.
    let program = fs::read(&pre_path).unwrap_or_default();
    let hash = blake3::hash(&program);
    let dir = failures_dir.join(hex::encode(&hash.as_bytes()[..REPRODUCER_HASH_BYTES]));

    debug!(
        "Preserving trial #{} ({} bytes of input) in '{}'",
        iteration,
        program.len(),
        dir.display()
    );

    fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create reproducer directory '{}'", dir.display()))?;

    for source in [pre_path, plan.post_path()] {
        let Some(name) = source.file_name() else {
            continue;
        };
        if source.is_file() {
            fs::copy(&source, dir.join(name)).with_context(|| {
                format!("Failed to copy '{}' into '{}'", source.display(), dir.display())
            })?;
        }
    }

    let report = FailureReport {
        iteration,
        error: error.to_string(),
        verdict: error.verdict(),
        stages: error.outcomes(),
    };
    let report_path = dir.join(REPORT_FILENAME);
    fs::write(&report_path, serde_json::to_string_pretty(&report)?)
        .with_context(|| format!("Failed to write '{}'", report_path.display()))?;

    Ok(dir)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{RunSettings, Stage, Toolchain};
    use std::time::Duration;
    use tempfile::TempDir;

    fn plan_in(dir: &Path) -> TrialPlan {
        TrialPlan::from_settings(&RunSettings {
            tools: Toolchain::default(),
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

    fn sat_failure() -> TrialError {
        TrialError::ValidationFailed {
            marker: "unsat".to_string(),
            verdict: Verdict::Sat,
            reason: Verdict::Sat.describe(),
            stages: vec![StageOutcome {
                stage: Stage::Solve,
                argv: vec!["z3".to_string(), "-in".to_string()],
                exit_code: Some(0),
                stdout: "sat\n".to_string(),
                stderr: String::new(),
                duration: Duration::from_millis(12),
            }],
        }
    }

    #[test]
    fn test_preserve_copies_inputs_and_writes_report() {
        let work = TempDir::new().unwrap();
        let failures = TempDir::new().unwrap();
        fs::write(work.path().join("test1.mlir"), "%0 = arith.addi %a, %a : i32").unwrap();
        fs::write(work.path().join("test2.mlir"), "%0 = arith.muli %a, %c2 : i32").unwrap();

        let dir = preserve(failures.path(), &plan_in(work.path()), 7, &sat_failure()).unwrap();

        assert_eq!(dir.file_name().unwrap().len(), REPRODUCER_HASH_BYTES * 2);
        assert!(dir.join("test1.mlir").is_file());
        assert!(dir.join("test2.mlir").is_file());

        let report: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(dir.join(REPORT_FILENAME)).unwrap())
                .unwrap();
        assert_eq!(report["iteration"], 7);
        assert_eq!(report["verdict"], "sat");
        assert_eq!(report["stages"][0]["stage"], "solve");
        assert_eq!(report["stages"][0]["duration"], 12);
    }

    #[test]
    fn test_same_program_lands_in_same_directory() {
        let work = TempDir::new().unwrap();
        let failures = TempDir::new().unwrap();
        fs::write(work.path().join("test1.mlir"), "same").unwrap();
        let plan = plan_in(work.path());

        let first = preserve(failures.path(), &plan, 1, &sat_failure()).unwrap();
        let second = preserve(failures.path(), &plan, 2, &sat_failure()).unwrap();

        assert_eq!(first, second);
        assert_eq!(fs::read_dir(failures.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_missing_intermediate_files_are_skipped() {
        let work = TempDir::new().unwrap();
        let failures = TempDir::new().unwrap();

        let dir = preserve(failures.path(), &plan_in(work.path()), 1, &sat_failure()).unwrap();

        assert!(!dir.join("test1.mlir").exists());
        assert!(dir.join(REPORT_FILENAME).is_file());
    }
}
