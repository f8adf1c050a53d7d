//! # System Interaction Layer
//!
//! This module provides abstractions for interacting with the underlying operating system.
//! It serves as a boundary between the trial logic and the specifics of process
//! management.
//!
//! ## Modules
//!
//! - **`executor`**: Spawns one external tool with an explicit argv, feeds its stdin,
//!   drains its stdout/stderr, and kills it on Ctrl+C or when its time limit expires.

pub mod executor;
