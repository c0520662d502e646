//! CLI argument parsing for lfs-shim.
//!
//! Uses clap derive macros for declarative argument definitions.
//! This module defines the command structure; actual implementations
//! are in the `commands` module.

use clap::{Parser, Subcommand, ValueEnum};
use lfs_shim::locks::LockMode;
use std::path::PathBuf;

/// lfs-shim: exercise and inspect LuaFileSystem-style locks from the shell.
///
/// Locks taken here follow the same rules as locks taken by scripts:
/// - `lock` takes an advisory byte-range lock on a file
/// - `lock-dir` creates a directory's sentinel file
/// - `status` and `clear` inspect and remove orphaned sentinels
#[derive(Parser, Debug)]
#[command(name = "lfs-shim")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// YAML configuration file. Defaults are used when omitted.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Available commands for lfs-shim.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Take a byte-range lock on a file.
    ///
    /// Exits 2 if another holder has a conflicting lock.
    Lock(LockArgs),

    /// Lock a directory by creating its sentinel file.
    ///
    /// Exits 2 if the sentinel already exists.
    LockDir(LockDirArgs),

    /// Show the sentinel of a directory, if any.
    ///
    /// Reports owner, age, and whether the sentinel is stale.
    Status(StatusArgs),

    /// Remove an orphaned sentinel.
    ///
    /// Only stale sentinels are removed unless --force is given.
    Clear(ClearArgs),

    /// Print the lock driver and directory-lock strategy that would be used.
    Detect,
}

/// Lock mode accepted on the command line.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeArg {
    /// Shared (read) lock.
    R,
    /// Exclusive (write) lock.
    W,
}

impl ModeArg {
    pub fn lock_mode(&self) -> LockMode {
        match self {
            ModeArg::R => LockMode::Shared,
            ModeArg::W => LockMode::Exclusive,
        }
    }
}

/// Arguments for the `lock` command.
#[derive(Parser, Debug)]
pub struct LockArgs {
    /// File to lock. It is opened read-write.
    pub file: PathBuf,

    /// Lock mode.
    #[arg(short, long, value_enum, default_value = "w")]
    pub mode: ModeArg,

    /// First byte of the range.
    #[arg(long, default_value_t = 0)]
    pub start: i64,

    /// Length of the range; 0 extends to end of file.
    #[arg(long, default_value_t = 0)]
    pub len: i64,

    /// Seconds to hold the lock before releasing it.
    #[arg(long, default_value_t = 0)]
    pub hold: u64,
}

/// Arguments for the `lock-dir` command.
#[derive(Parser, Debug)]
pub struct LockDirArgs {
    /// Directory to lock.
    pub dir: PathBuf,

    /// Seconds to hold the lock before releasing it.
    #[arg(long, default_value_t = 0)]
    pub hold: u64,
}

/// Arguments for the `status` command.
#[derive(Parser, Debug)]
pub struct StatusArgs {
    /// Directory whose sentinel should be inspected.
    pub dir: PathBuf,
}

/// Arguments for the `clear` command.
#[derive(Parser, Debug)]
pub struct ClearArgs {
    /// Directory whose sentinel should be removed.
    pub dir: PathBuf,

    /// Remove the sentinel even if it is not stale.
    #[arg(long)]
    pub force: bool,
}

impl Cli {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
