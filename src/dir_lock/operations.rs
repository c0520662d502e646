//! Directory lock acquisition, inspection, and clearing operations.

use super::guard::DirLock;
use super::metadata::SentinelMetadata;
use super::strategy;
use super::types::{DirLockStrategy, SentinelInfo};
use crate::config::Config;
use crate::error::{LfsError, Result, classify_io};
use crate::reclaim::Scheduler;
use chrono::{DateTime, Utc};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Lock `dir` by creating its sentinel.
///
/// # Returns
///
/// * `Ok(DirLock)` - Sentinel created and registered for removal
/// * `Err(LfsError::FileExists)` - Another holder's sentinel is present
/// * `Err(_)` - Any other failure, classified from the OS error
pub fn lock_directory(dir: &Path, config: &Config, scheduler: &Scheduler) -> Result<DirLock> {
    let strategy = DirLockStrategy::resolve(config.dir_lock_strategy)?;
    let path = sentinel_path(dir, config);

    let sentinel = strategy::create(strategy, &path, config.write_sentinel_metadata)?;
    debug!(path = %path.display(), strategy = strategy.as_str(), "directory locked");
    DirLock::new(sentinel, scheduler)
}

/// Where the sentinel for `dir` lives.
pub fn sentinel_path(dir: &Path, config: &Config) -> PathBuf {
    dir.join(&config.sentinel_name)
}

/// Describe the sentinel in `dir`, if there is one.
pub fn inspect(dir: &Path, config: &Config) -> Result<Option<SentinelInfo>> {
    let path = sentinel_path(dir, config);

    let file_meta = match fs::metadata(&path) {
        Ok(meta) => meta,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(classify_io(&e)),
    };

    // Sentinels without metadata, or held open exclusively, fall back to mtime.
    let metadata = SentinelMetadata::read(&path);
    let modified = file_meta.modified().ok().map(DateTime::<Utc>::from);
    Ok(Some(SentinelInfo::new(
        path,
        metadata,
        modified,
        config.stale_sentinel_minutes,
    )))
}

/// Remove an orphaned sentinel from `dir`.
///
/// The sentinel must be stale unless `force` is set. The caller is responsible
/// for making sure its holder is really gone.
///
/// # Returns
///
/// * `Ok(SentinelInfo)` - Information about the removed sentinel (for audit purposes)
/// * `Err(LfsError::Io)` - No sentinel exists
/// * `Err(LfsError::Fault)` - Sentinel is not stale and `force` was not given
pub fn clear_stale(dir: &Path, config: &Config, force: bool) -> Result<SentinelInfo> {
    let info = inspect(dir, config)?.ok_or_else(|| LfsError::Io {
        message: format!(
            "no sentinel at '{}'",
            sentinel_path(dir, config).display()
        ),
        code: Some(2),
    })?;

    if !info.is_stale && !force {
        return Err(LfsError::Fault(format!(
            "sentinel '{}' is not stale (age {}); use --force to clear it",
            info.path.display(),
            info.age_string()
        )));
    }

    fs::remove_file(&info.path).map_err(|e| classify_io(&e))?;
    info!(path = %info.path.display(), forced = force, "sentinel cleared");
    Ok(info)
}
