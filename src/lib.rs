//! Translation-validation fuzzing for MLIR canonicalization.
//!
//! A trial runs an external tool chain (enumerator, optimizer, translation validator,
//! SMT solver) and passes when the solver proves that canonicalization refined the
//! program. See [`crate::core::trial::run_once`] and [`crate::core::fuzz_loop::run`].

use std::sync::Arc;
use std::sync::atomic::AtomicBool;

/// Set to `true` by the Ctrl+C handler; checked between trials and while a stage runs.
pub type CancellationToken = Arc<AtomicBool>;

pub mod cli;
pub mod constants;
pub mod core;
pub mod models;
pub mod system;
