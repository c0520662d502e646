//! lfs-shim: exercise and inspect file and directory locks from the shell.
//!
//! This is the main entry point for the `lfs-shim` CLI. It parses arguments,
//! dispatches to the appropriate command handler, drains the reclamation
//! scheduler, and handles errors with proper exit codes.

mod cli;
mod commands;

use cli::Cli;
use lfs_shim::exit_codes;
use lfs_shim::reclaim::Scheduler;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    init_logging();
    let cli = Cli::parse_args();

    let result = commands::dispatch(cli);

    // Release whatever the command left tracked before the process exits.
    if let Some(scheduler) = Scheduler::try_global() {
        scheduler.shutdown();
    }

    match result {
        Ok(()) => ExitCode::from(exit_codes::SUCCESS as u8),
        Err(err) => {
            // Print user-actionable error message to stderr
            eprintln!("Error: {}", err);

            // Return appropriate exit code
            ExitCode::from(err.exit_code() as u8)
        }
    }
}

/// Log to stderr, filtered by `LFS_LOG` (warnings only when unset).
fn init_logging() {
    let filter = EnvFilter::try_from_env("LFS_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
