//! Command line runner
//!
//! Usage: snapjs [--config FILE] [--time-limit MS] [--save SNAPSHOT] [--restore SNAPSHOT] [FILE...]
//!
//! Restores a snapshot if asked, starts one thread per script, drives the
//! scheduler until nothing is left to do (sleeping while timers are
//! pending) and optionally saves a snapshot of whatever is left.

use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use snapjs::platform::StdConsoleProvider;
use snapjs::{Interpreter, InterpreterConfig, RunResult, ThreadId, ThreadOutcome};

#[derive(Parser)]
#[command(name = "snapjs")]
#[command(about = "Run scripts on a resumable, snapshottable interpreter", long_about = None)]
struct Cli {
    /// Interpreter configuration as JSON
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Time limit for each uninterrupted run of a thread, in milliseconds
    #[arg(long, value_name = "MS")]
    time_limit: Option<f64>,

    /// Write a snapshot here when the run ends
    #[arg(long, value_name = "SNAPSHOT")]
    save: Option<PathBuf>,

    /// Start from this snapshot instead of a fresh interpreter
    #[arg(long, value_name = "SNAPSHOT")]
    restore: Option<PathBuf>,

    /// Scripts to run, each on its own thread
    files: Vec<PathBuf>,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    match run(Cli::parse()) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

/// Returns whether every script finished without an uncaught throw
fn run(cli: Cli) -> Result<bool, Box<dyn std::error::Error>> {
    let mut config = match &cli.config {
        Some(path) => {
            let text = fs::read_to_string(path)
                .map_err(|e| format!("Cannot read {}: {}", path.display(), e))?;
            InterpreterConfig::from_json(&text)?
        }
        None => InterpreterConfig::default(),
    };
    if let Some(limit) = cli.time_limit {
        config = config.with_time_limit(limit);
    }
    // Allow overriding GC threshold via environment variable for stress testing
    if let Some(threshold) = std::env::var("GC_THRESHOLD")
        .ok()
        .and_then(|s| s.parse::<usize>().ok())
    {
        config = config.with_gc_threshold(threshold);
    }

    let mut interp = Interpreter::with_config(config)?;
    interp.set_console(Box::new(StdConsoleProvider));

    if let Some(path) = &cli.restore {
        let text = fs::read_to_string(path)
            .map_err(|e| format!("Cannot read {}: {}", path.display(), e))?;
        interp.restore_str(&text)?;
    }

    let mut scripts: Vec<(ThreadId, PathBuf)> = Vec::new();
    for path in &cli.files {
        let source = fs::read_to_string(path)
            .map_err(|e| format!("Cannot read {}: {}", path.display(), e))?;
        let thread = interp
            .spawn(&source)
            .map_err(|e| format!("{}: {}", path.display(), e))?;
        scripts.push((thread, path.clone()));
    }

    loop {
        match interp.run_to_quiescence()? {
            RunResult::MoreWorkAt(at) => interp.wait_until(at),
            RunResult::BlockedForever => {
                tracing::warn!("remaining threads are blocked with no pending wake-up");
                break;
            }
            RunResult::Done | RunResult::Paused => break,
        }
    }

    let mut ok = true;
    for (thread, path) in scripts {
        if let Some(ThreadOutcome::Threw(value)) = interp.take_thread_result(thread) {
            tracing::debug!(file = %path.display(), error = %interp.render_error(&value), "script failed");
            ok = false;
        }
    }

    if let Some(path) = &cli.save {
        fs::write(path, interp.snapshot_string()?)
            .map_err(|e| format!("Cannot write {}: {}", path.display(), e))?;
    }
    Ok(ok)
}
