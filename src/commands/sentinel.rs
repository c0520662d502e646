//! `status` and `clear`: inspect and remove sentinels left by other processes.

use crate::cli::{ClearArgs, StatusArgs};
use lfs_shim::config::Config;
use lfs_shim::dir_lock::{self, SentinelInfo};
use lfs_shim::error::Result;

pub(super) fn cmd_status(config: &Config, args: StatusArgs) -> Result<()> {
    let Some(info) = dir_lock::inspect(&args.dir, config)? else {
        println!("No sentinel in {}.", args.dir.display());
        return Ok(());
    };

    println!("Sentinel in {}:", args.dir.display());
    print_details(&info);
    if info.is_stale {
        println!(
            "  Status:     STALE (exceeds {} min threshold)",
            config.stale_sentinel_minutes
        );
        println!();
        println!(
            "Note: the sentinel is stale. Use `lfs-shim clear {}` to remove it.",
            args.dir.display()
        );
    }

    Ok(())
}

pub(super) fn cmd_clear(config: &Config, args: ClearArgs) -> Result<()> {
    let cleared = dir_lock::clear_stale(&args.dir, config, args.force)?;

    println!("Cleared sentinel: {}", cleared.path.display());
    println!();
    println!("Sentinel details:");
    print_details(&cleared);
    if cleared.is_stale {
        println!("  Status:     was STALE");
    }

    Ok(())
}

fn print_details(info: &SentinelInfo) {
    match &info.metadata {
        Some(meta) => {
            println!("  Owner:      {}", meta.owner);
            if let Some(pid) = meta.pid {
                println!("  PID:        {}", pid);
            }
            println!("  Strategy:   {}", meta.strategy);
        }
        None => println!("  Owner:      unknown (no metadata)"),
    }
    if let Some(created_at) = info.created_at {
        println!("  Created:    {}", created_at.format("%Y-%m-%d %H:%M:%S UTC"));
    }
    println!("  Age:        {}", info.age_string());
    println!("  Path:       {}", info.path.display());
}
