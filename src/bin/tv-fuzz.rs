// src/bin/tv-fuzz.rs

use anyhow::Result;
use clap::Parser;
use colored::*;
use std::io::{self, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tv_fuzz::{
    CancellationToken,
    cli::Cli,
    constants::INTERRUPTED_EXIT_CODE,
    core::{config_loader, fuzz_loop},
    models::{RunSummary, StopReason},
};

/// The main entry point of `tv-fuzz`.
/// It sets up logging and Ctrl+C handling, runs the fuzzer, and performs centralized
/// error handling.
fn main() {
    env_logger::init();

    let cancellation_token: CancellationToken = Arc::new(AtomicBool::new(false));
    let handler_token = Arc::clone(&cancellation_token);
    // The running stage receives SIGINT from the terminal too; the flag stops the loop.
    if let Err(e) = ctrlc::set_handler(move || handler_token.store(true, Ordering::SeqCst)) {
        log::warn!("Could not install the Ctrl+C handler: {}", e);
    }

    if let Err(e) = run_cli(Cli::parse(), &cancellation_token) {
        // --- Centralized Error Handling ---
        if fuzz_loop::is_interrupted(&e) {
            // Exit silently with the standard exit code for interruption.
            std::process::exit(INTERRUPTED_EXIT_CODE);
        }

        eprintln!("\n{}: {:#}", "Error".red().bold(), e);
        std::process::exit(1);
    }
}

fn run_cli(cli: Cli, cancellation_token: &CancellationToken) -> Result<()> {
    log::debug!("CLI args parsed: {:?}", cli);

    let settings = config_loader::load_settings(&cli)?;

    if cli.print_config {
        let rendered = toml::to_string_pretty(&config_loader::effective_config(&settings))?;
        print!("{}", rendered);
        return Ok(());
    }

    let summary = if settings.quiet {
        fuzz_loop::run(&settings, cancellation_token, &mut io::sink())?
    } else {
        let stdout = io::stdout();
        let mut out = stdout.lock();
        let summary = fuzz_loop::run(&settings, cancellation_token, &mut out)?;
        out.flush()?;
        summary
    };

    print_summary(&summary);
    Ok(())
}

fn print_summary(summary: &RunSummary) {
    let reason = match summary.stop {
        StopReason::IterationLimit => "iteration limit reached",
        StopReason::Cancelled => "cancelled",
    };
    println!(
        "{} {} trial(s) passed in {:.1}s ({}).",
        "✔".green().bold(),
        summary.passed,
        summary.elapsed.as_secs_f64(),
        reason.dimmed()
    );
}
