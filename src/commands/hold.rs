//! `lock` and `lock-dir`: take a lock, optionally hold it, then release it.

use crate::cli::{LockArgs, LockDirArgs};
use lfs_shim::config::Config;
use lfs_shim::dir_lock;
use lfs_shim::error::{Result, classify_io};
use lfs_shim::file::FileHandle;
use lfs_shim::lfs::Lfs;
use lfs_shim::locks::LockRange;
use lfs_shim::reclaim::Scheduler;
use std::fs::OpenOptions;
use std::thread;
use std::time::Duration;
use tracing::debug;

pub(super) fn cmd_lock(config: &Config, args: LockArgs) -> Result<()> {
    let lfs = Lfs::new(config.clone())?;

    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .open(&args.file)
        .map_err(|e| classify_io(&e))?;
    let file = FileHandle::from(file);

    let mode = args.mode.lock_mode();
    let range = LockRange::new(args.start, args.len)?;

    lfs.registry().lock(&file, mode, range)?;
    println!(
        "Locked {} ({}, {}) with {} driver",
        args.file.display(),
        mode.as_str(),
        describe_range(range),
        lfs.registry().driver().name()
    );

    hold_for(args.hold);

    lfs.registry().unlock(&file, range)?;
    println!("Released {}", args.file.display());
    Ok(())
}

pub(super) fn cmd_lock_dir(config: &Config, args: LockDirArgs) -> Result<()> {
    config.validate()?;
    let scheduler = Scheduler::init_global(config);

    let lock = dir_lock::lock_directory(&args.dir, config, scheduler)?;
    println!("Locked {}", args.dir.display());
    println!("  Sentinel:   {}", lock.path().display());

    hold_for(args.hold);

    lock.free();
    println!("Released {}", args.dir.display());
    Ok(())
}

fn hold_for(seconds: u64) {
    if seconds > 0 {
        debug!(seconds, "holding lock");
        thread::sleep(Duration::from_secs(seconds));
    }
}

fn describe_range(range: LockRange) -> String {
    if range.is_whole_file() {
        "whole file".to_string()
    } else {
        match range.end() {
            Some(end) => format!("bytes {}..{}", range.start, end),
            None => format!("bytes {}..", range.start),
        }
    }
}
