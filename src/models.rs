// src/models.rs

use crate::constants::{
    DEFAULT_ENUMERATOR, DEFAULT_OPTIMIZER, DEFAULT_SOLVER, DEFAULT_VALIDATOR, DIALECT_PLACEHOLDER,
    POST_PLACEHOLDER, PRE_PLACEHOLDER,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

// --- `tv-fuzz.toml` MODELS (What is read from the configuration file) ---

/// A command as written in the configuration file. Uses `untagged` for flexible syntax:
/// either a single shell-like line (`"z3 -in"`) or an explicit argv array
/// (`["z3", "-in"]`).
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(untagged)]
pub enum TomlCommand {
    /// An explicit argument vector. Used verbatim.
    Argv(Vec<String>),
    /// A single line, split with POSIX shell-word rules (no pipes, no redirections).
    Line(String),
}

/// The `[tools]` table. Every stage is optional; missing stages fall back to the defaults.
#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ToolsConfig {
    /// Produces a random program on stdout from the dialect description.
    pub enumerate: Option<TomlCommand>,
    /// Reads the program on stdin and writes its generic form to `{pre}`.
    pub print_generic: Option<TomlCommand>,
    /// Canonicalizes `{pre}` into `{post}`.
    pub canonicalize: Option<TomlCommand>,
    /// Emits an SMT-LIB refinement query comparing `{pre}` and `{post}` on stdout.
    pub validate: Option<TomlCommand>,
    /// Reads the query on stdin and prints the solver verdict.
    pub solve: Option<TomlCommand>,
}

/// Represents the deserialized structure of a `tv-fuzz.toml` file.
/// Every field is optional so that files can be layered on top of each other.
#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct FuzzConfig {
    /// Dialect description handed to the enumerator (`{dialect}`).
    pub dialect: Option<String>,
    /// Pre-canonicalization program (`{pre}`).
    pub pre_file: Option<String>,
    /// Post-canonicalization program (`{post}`).
    pub post_file: Option<String>,
    /// Substring of the solver output that marks a passing trial.
    pub marker: Option<String>,
    /// Stop after this many passing trials. Unset means run forever.
    pub iterations: Option<u64>,
    /// Per-stage wall-clock limit in seconds. `0` disables it.
    pub timeout_secs: Option<u64>,
    /// Directory every stage runs in.
    pub work_dir: Option<String>,
    /// Where failing inputs are preserved. Relative paths are resolved against `work_dir`.
    pub failures_dir: Option<String>,
    /// Suppress the per-trial acknowledgment.
    pub quiet: Option<bool>,
    /// Stage commands.
    #[serde(default, skip_serializing_if = "ToolsConfig::is_empty")]
    pub tools: ToolsConfig,
}

impl ToolsConfig {
    /// Returns `true` if no stage is overridden.
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    /// The entry for `stage`, so layers can be merged stage by stage.
    pub fn slot_mut(&mut self, stage: Stage) -> &mut Option<TomlCommand> {
        match stage {
            Stage::Enumerate => &mut self.enumerate,
            Stage::PrintGeneric => &mut self.print_generic,
            Stage::Canonicalize => &mut self.canonicalize,
            Stage::Validate => &mut self.validate,
            Stage::Solve => &mut self.solve,
        }
    }
}

// --- RESOLVED MODELS (What the fuzzer actually runs with) ---

/// One of the five stages of a translation-validation trial, in execution order.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// `mlir-enumerate {dialect}`
    Enumerate,
    /// `mlir-opt --mlir-print-op-generic -o {pre}`
    PrintGeneric,
    /// `mlir-opt --canonicalize --mlir-print-op-generic {pre} -o {post}`
    Canonicalize,
    /// `xdsl-tv {pre} {post}`
    Validate,
    /// `z3 -in`
    Solve,
}

impl Stage {
    /// All stages, in the order a trial runs them.
    pub const ALL: [Self; 5] = [
        Self::Enumerate,
        Self::PrintGeneric,
        Self::Canonicalize,
        Self::Validate,
        Self::Solve,
    ];

    /// The stage's key in the `[tools]` table.
    pub fn name(self) -> &'static str {
        match self {
            Self::Enumerate => "enumerate",
            Self::PrintGeneric => "print_generic",
            Self::Canonicalize => "canonicalize",
            Self::Validate => "validate",
            Self::Solve => "solve",
        }
    }

    /// Whether this stage reads the previous stage's stdout on its stdin.
    pub fn reads_previous_stdout(self) -> bool {
        matches!(self, Self::PrintGeneric | Self::Solve)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A fully-resolved external command: a program and its argument templates.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct StageCommand {
    /// The executable, looked up in `PATH` unless it contains a separator.
    pub program: String,
    /// Arguments, possibly containing `{dialect}`, `{pre}` or `{post}`.
    pub args: Vec<String>,
}

impl StageCommand {
    /// Builds a command from string slices.
    pub fn new(program: &str, args: &[&str]) -> Self {
        Self {
            program: program.to_string(),
            args: args.iter().map(|a| (*a).to_string()).collect(),
        }
    }

    /// The full argument vector, program first.
    pub fn argv(&self) -> Vec<String> {
        std::iter::once(self.program.clone())
            .chain(self.args.iter().cloned())
            .collect()
    }
}

/// The commands for every stage.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Toolchain {
    /// See [`Stage::Enumerate`].
    pub enumerate: StageCommand,
    /// See [`Stage::PrintGeneric`].
    pub print_generic: StageCommand,
    /// See [`Stage::Canonicalize`].
    pub canonicalize: StageCommand,
    /// See [`Stage::Validate`].
    pub validate: StageCommand,
    /// See [`Stage::Solve`].
    pub solve: StageCommand,
}

impl Toolchain {
    /// Returns the command configured for `stage`.
    pub fn get(&self, stage: Stage) -> &StageCommand {
        match stage {
            Stage::Enumerate => &self.enumerate,
            Stage::PrintGeneric => &self.print_generic,
            Stage::Canonicalize => &self.canonicalize,
            Stage::Validate => &self.validate,
            Stage::Solve => &self.solve,
        }
    }

    /// Returns a mutable reference to the command configured for `stage`.
    pub fn get_mut(&mut self, stage: Stage) -> &mut StageCommand {
        match stage {
            Stage::Enumerate => &mut self.enumerate,
            Stage::PrintGeneric => &mut self.print_generic,
            Stage::Canonicalize => &mut self.canonicalize,
            Stage::Validate => &mut self.validate,
            Stage::Solve => &mut self.solve,
        }
    }
}

impl Default for Toolchain {
    fn default() -> Self {
        Self {
            enumerate: StageCommand::new(DEFAULT_ENUMERATOR, &[DIALECT_PLACEHOLDER]),
            print_generic: StageCommand::new(
                DEFAULT_OPTIMIZER,
                &["--mlir-print-op-generic", "-o", PRE_PLACEHOLDER],
            ),
            canonicalize: StageCommand::new(
                DEFAULT_OPTIMIZER,
                &[
                    "--canonicalize",
                    "--mlir-print-op-generic",
                    PRE_PLACEHOLDER,
                    "-o",
                    POST_PLACEHOLDER,
                ],
            ),
            validate: StageCommand::new(DEFAULT_VALIDATOR, &[PRE_PLACEHOLDER, POST_PLACEHOLDER]),
            solve: StageCommand::new(DEFAULT_SOLVER, &["-in"]),
        }
    }
}

/// The effective settings of a run, after merging defaults, config files and CLI flags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSettings {
    /// Stage commands.
    pub tools: Toolchain,
    /// Dialect description handed to the enumerator.
    pub dialect: PathBuf,
    /// Pre-canonicalization program, relative to `work_dir` unless absolute.
    pub pre_file: PathBuf,
    /// Post-canonicalization program, relative to `work_dir` unless absolute.
    pub post_file: PathBuf,
    /// Substring of the solver output that marks a passing trial.
    pub marker: String,
    /// Stop after this many passing trials. `None` runs until failure or Ctrl+C.
    pub iterations: Option<u64>,
    /// Per-stage wall-clock limit.
    pub timeout: Option<Duration>,
    /// Absolute directory every stage runs in.
    pub work_dir: PathBuf,
    /// Absolute directory for failing inputs, if preservation is enabled.
    pub failures_dir: Option<PathBuf>,
    /// Suppress the per-trial acknowledgment.
    pub quiet: bool,
}

// --- TRIAL RESULTS ---

/// The solver's answer, read from its stdout.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    /// No counterexample exists: the rewrite is a refinement.
    Unsat,
    /// A counterexample exists: canonicalization changed the semantics.
    Sat,
    /// The solver gave up.
    Unknown,
    /// Anything else: solver errors, empty output, malformed queries.
    Unrecognized,
}

/// What happened when one stage ran.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct StageOutcome {
    /// Which stage.
    pub stage: Stage,
    /// The argv that was executed, placeholders substituted.
    pub argv: Vec<String>,
    /// Exit code, `None` if the process was killed by a signal.
    pub exit_code: Option<i32>,
    /// Captured stdout (lossy UTF-8).
    pub stdout: String,
    /// Captured stderr (lossy UTF-8).
    pub stderr: String,
    /// Wall-clock time of the stage.
    #[serde(with = "duration_millis")]
    pub duration: Duration,
}

/// The record of a passing trial.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct TrialReport {
    /// One entry per stage, in execution order.
    pub stages: Vec<StageOutcome>,
    /// How the solver answered.
    pub verdict: Verdict,
}

/// Why a run stopped without a failing trial.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The configured number of trials passed.
    IterationLimit,
    /// Ctrl+C was pressed between trials.
    Cancelled,
}

/// Totals for a run that ended without a failing trial.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    /// Number of trials that passed.
    pub passed: u64,
    /// Wall-clock time of the whole run.
    pub elapsed: Duration,
    /// Why the loop stopped.
    pub stop: StopReason,
}

mod duration_millis {
    use serde::Serializer;
    use std::time::Duration;

    pub(super) fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
    }
}
