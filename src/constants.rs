// src/constants.rs

//! Built-in defaults. These reproduce the classic
//! `mlir-enumerate | mlir-opt && mlir-opt --canonicalize && xdsl-tv | z3` chain.

/// The name of the project-local configuration file, looked up in the working directory.
pub const LOCAL_CONFIG_FILENAME: &str = "tv-fuzz.toml";

/// The name of the directory under the system config dir (e.g. `~/.config/tv-fuzz`).
pub const CONFIG_DIR_NAME: &str = "tv-fuzz";

/// The name of the user-level configuration file (inside `CONFIG_DIR_NAME`).
pub const USER_CONFIG_FILENAME: &str = "config.toml";

/// The program enumerator, relative to the working directory.
pub const DEFAULT_ENUMERATOR: &str = "./build/bin/mlir-enumerate";

/// The dialect description fed to the enumerator.
pub const DEFAULT_DIALECT: &str = "dialects/arith.mlir";

/// The optimizer used both to print the generic form and to canonicalize.
pub const DEFAULT_OPTIMIZER: &str = "mlir-opt";

/// The translation-validation tool emitting an SMT-LIB query.
pub const DEFAULT_VALIDATOR: &str = "xdsl-tv";

/// The SMT solver, reading its query from stdin.
pub const DEFAULT_SOLVER: &str = "z3";

/// The pre-canonicalization program, overwritten every trial.
pub const DEFAULT_PRE_FILE: &str = "test1.mlir";

/// The post-canonicalization program, overwritten every trial.
pub const DEFAULT_POST_FILE: &str = "test2.mlir";

/// The substring in solver output that means "no counterexample".
pub const DEFAULT_MARKER: &str = "unsat";

/// The acknowledgment printed after every passing trial.
pub const SUCCESS_MESSAGE: &str = "nice";

/// Placeholder tokens accepted in stage arguments.
pub const DIALECT_PLACEHOLDER: &str = "{dialect}";
/// See [`DIALECT_PLACEHOLDER`].
pub const PRE_PLACEHOLDER: &str = "{pre}";
/// See [`DIALECT_PLACEHOLDER`].
pub const POST_PLACEHOLDER: &str = "{post}";

/// The name of the metadata file written next to a preserved reproducer.
pub const REPORT_FILENAME: &str = "report.json";

/// Number of hash bytes used to name reproducer directories (16 hex characters).
pub const REPRODUCER_HASH_BYTES: usize = 8;

/// Exit code used when the run is interrupted with Ctrl+C.
pub const INTERRUPTED_EXIT_CODE: i32 = 130;
