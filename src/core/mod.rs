// src/core/mod.rs

pub mod config_loader;
pub mod fuzz_loop;
pub mod pipeline;
pub mod reproducer;
pub mod trial;
pub mod verdict;
