// src/cli.rs

use clap::Parser;
use std::path::PathBuf;

/// tv-fuzz: fuzzes MLIR canonicalization with translation validation.
///
/// Each trial enumerates a random program, prints it in generic form, canonicalizes it,
/// asks the translation validator for a refinement query and hands that query to an SMT
/// solver. The trial passes when the solver answers `unsat`. Trials repeat until one fails
/// or the iteration limit is reached; the first failure aborts the run.
///
/// Configuration is read, in increasing priority, from `~/.config/tv-fuzz/config.toml`,
/// `./tv-fuzz.toml`, the file given with `--config`, and finally the flags below.
#[derive(Parser, Debug, Default)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Read configuration from this TOML file (on top of the discovered ones).
    #[arg(long, short = 'c', value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Stop after this many passing trials. Runs forever if omitted.
    #[arg(long, short = 'n', value_name = "N")]
    pub iterations: Option<u64>,

    /// Kill any stage that runs longer than this many seconds (0 disables the limit).
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Run every stage in this directory instead of the current one.
    #[arg(long = "work-dir", short = 'C', value_name = "DIR")]
    pub work_dir: Option<String>,

    /// Preserve failing inputs and a JSON report under this directory.
    #[arg(long, value_name = "DIR")]
    pub failures_dir: Option<String>,

    /// Dialect description handed to the enumerator.
    #[arg(long, value_name = "FILE")]
    pub dialect: Option<String>,

    /// Substring of the solver output that marks a passing trial.
    #[arg(long, value_name = "TEXT")]
    pub marker: Option<String>,

    /// Do not print the acknowledgment after each passing trial.
    #[arg(long, short)]
    pub quiet: bool,

    /// Print the effective configuration as TOML and exit.
    #[arg(long)]
    pub print_config: bool,
}
