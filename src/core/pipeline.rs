// src/core/pipeline.rs

//! Turns [`RunSettings`] into the concrete, placeholder-free stage list a trial executes.

use crate::{
    constants::{DIALECT_PLACEHOLDER, POST_PLACEHOLDER, PRE_PLACEHOLDER},
    models::{RunSettings, Stage},
};
use std::path::PathBuf;
use std::time::Duration;

/// One stage, ready to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagePlan {
    /// Which stage this is.
    pub stage: Stage,
    /// Program and arguments, placeholders already substituted.
    pub argv: Vec<String>,
    /// Whether the previous stage's stdout is fed to this stage's stdin.
    pub piped_stdin: bool,
}

/// Everything `trial::run_once` needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrialPlan {
    /// The five stages, in execution order. The last one is the solver.
    pub stages: Vec<StagePlan>,
    /// Directory every stage runs in.
    pub work_dir: PathBuf,
    /// Pre-canonicalization program, as seen from `work_dir`.
    pub pre_file: PathBuf,
    /// Post-canonicalization program, as seen from `work_dir`.
    pub post_file: PathBuf,
    /// Substring marking a passing solver output.
    pub marker: String,
    /// Per-stage time limit.
    pub timeout: Option<Duration>,
}

impl TrialPlan {
    /// Builds the plan for `settings`.
    pub fn from_settings(settings: &RunSettings) -> Self {
        let dialect = settings.dialect.to_string_lossy();
        let pre = settings.pre_file.to_string_lossy();
        let post = settings.post_file.to_string_lossy();

        let stages = Stage::ALL
            .into_iter()
            .map(|stage| StagePlan {
                stage,
                argv: settings
                    .tools
                    .get(stage)
                    .argv()
                    .iter()
                    .map(|arg| substitute(arg, &dialect, &pre, &post))
                    .collect(),
                piped_stdin: stage.reads_previous_stdout(),
            })
            .collect();

        Self {
            stages,
            work_dir: settings.work_dir.clone(),
            pre_file: settings.pre_file.clone(),
            post_file: settings.post_file.clone(),
            marker: settings.marker.clone(),
            timeout: settings.timeout,
        }
    }

    /// The pre-canonicalization program as an absolute (or `work_dir`-relative) path.
    pub fn pre_path(&self) -> PathBuf {
        self.work_dir.join(&self.pre_file)
    }

    /// The post-canonicalization program as an absolute (or `work_dir`-relative) path.
    pub fn post_path(&self) -> PathBuf {
        self.work_dir.join(&self.post_file)
    }
}

/// Replaces every placeholder in one argument. Placeholders may be embedded,
/// e.g. `--input={pre}`.
fn substitute(arg: &str, dialect: &str, pre: &str, post: &str) -> String {
    arg.replace(DIALECT_PLACEHOLDER, dialect)
        .replace(PRE_PLACEHOLDER, pre)
        .replace(POST_PLACEHOLDER, post)
}
