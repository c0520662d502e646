//! Command implementations for lfs-shim.
//!
//! This module provides the dispatcher that routes CLI commands to their
//! implementations. `lock` and `lock-dir` take and hold locks; `status` and
//! `clear` deal with sentinels left behind by other processes.

mod hold;
mod sentinel;

use crate::cli::{Cli, Command};
use lfs_shim::config::Config;
use lfs_shim::dir_lock::DirLockStrategy;
use lfs_shim::error::Result;
use lfs_shim::locks;

/// Dispatch a command to its implementation.
///
/// Configuration is read from `--config` when given; otherwise defaults apply.
pub fn dispatch(cli: Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };

    match cli.command {
        Command::Lock(args) => hold::cmd_lock(&config, args),
        Command::LockDir(args) => hold::cmd_lock_dir(&config, args),
        Command::Status(args) => sentinel::cmd_status(&config, args),
        Command::Clear(args) => sentinel::cmd_clear(&config, args),
        Command::Detect => cmd_detect(&config),
    }
}

fn cmd_detect(config: &Config) -> Result<()> {
    let driver = locks::select(config.driver)?;
    let strategy = DirLockStrategy::resolve(config.dir_lock_strategy)?;

    println!("Lock driver:    {} ({})", driver.name(), config.driver.as_str());
    println!(
        "Dir strategy:   {} ({})",
        strategy.as_str(),
        config.dir_lock_strategy.as_str()
    );
    println!("Sentinel name:  {}", config.sentinel_name);
    println!("Stale after:    {} min", config.stale_sentinel_minutes);

    Ok(())
}
