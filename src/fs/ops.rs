//! Directory and metadata mutations exposed to scripts.
//!
//! Paths arrive already resolved. Failures use the same vocabulary as the
//! lock functions.

use crate::error::{LfsError, Result, classify_io};
use std::fs::{self, File, FileTimes};
use std::path::Path;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

fn not_found() -> LfsError {
    LfsError::Io {
        message: "No such file or directory".to_string(),
        code: Some(2),
    }
}

fn not_a_directory() -> LfsError {
    LfsError::Io {
        message: "Not a directory".to_string(),
        code: Some(20),
    }
}

/// Create one directory. The parent must exist.
pub fn mkdir(path: &Path) -> Result<()> {
    if path.symlink_metadata().is_ok() {
        return Err(LfsError::FileExists);
    }
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
        && !parent.exists()
    {
        return Err(not_found());
    }
    fs::create_dir(path).map_err(|e| classify_io(&e))
}

/// Remove an empty directory.
pub fn rmdir(path: &Path) -> Result<()> {
    let meta = fs::symlink_metadata(path).map_err(|_| not_found())?;
    if !meta.is_dir() {
        return Err(not_a_directory());
    }
    fs::remove_dir(path).map_err(|e| classify_io(&e))
}

/// Set access and modification times, in seconds since the epoch.
///
/// `atime` defaults to now and `mtime` defaults to `atime`.
pub fn touch(path: &Path, atime: Option<i64>, mtime: Option<i64>) -> Result<()> {
    let atime = match atime {
        Some(secs) => from_epoch_secs(secs)?,
        None => SystemTime::now(),
    };
    let mtime = match mtime {
        Some(secs) => from_epoch_secs(secs)?,
        None => atime,
    };

    let file = open_for_times(path)?;
    file.set_times(FileTimes::new().set_accessed(atime).set_modified(mtime))
        .map_err(|e| classify_io(&e))
}

/// Create a hard link, or a symbolic link when `symbolic` is set.
///
/// A symbolic link stores `target` as given, relative to the link's directory.
pub fn link(target: &Path, link_path: &Path, symbolic: bool) -> Result<()> {
    if link_path.symlink_metadata().is_ok() {
        return Err(LfsError::FileExists);
    }
    let made = if symbolic {
        make_symlink(target, link_path)
    } else {
        fs::hard_link(target, link_path)
    };
    made.map_err(|e| classify_io(&e))
}

/// Check that `dir` can become the working directory.
///
/// The error carries the script's spelling of the path, as `chdir` reports it.
pub fn check_chdir(dir: &Path, shown: &str) -> Result<()> {
    let reason = match fs::metadata(dir) {
        Ok(meta) if meta.is_dir() => return Ok(()),
        Ok(_) => "Not a directory".to_string(),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            "No such file or directory".to_string()
        }
        Err(e) => classify_io(&e).to_string(),
    };
    Err(LfsError::Io {
        message: format!("Unable to change working directory to '{}'\n{}", shown, reason),
        code: None,
    })
}

fn from_epoch_secs(secs: i64) -> Result<SystemTime> {
    let offset = Duration::from_secs(secs.unsigned_abs());
    let time = if secs >= 0 {
        UNIX_EPOCH.checked_add(offset)
    } else {
        UNIX_EPOCH.checked_sub(offset)
    };
    time.ok_or(LfsError::InvalidArgument)
}

#[cfg(unix)]
fn open_for_times(path: &Path) -> Result<File> {
    File::open(path).map_err(|e| classify_io(&e))
}

#[cfg(windows)]
fn open_for_times(path: &Path) -> Result<File> {
    use std::os::windows::fs::OpenOptionsExt;
    const FILE_FLAG_BACKUP_SEMANTICS: u32 = 0x0200_0000;

    fs::OpenOptions::new()
        .write(true)
        .custom_flags(FILE_FLAG_BACKUP_SEMANTICS)
        .open(path)
        .map_err(|e| classify_io(&e))
}

#[cfg(not(any(unix, windows)))]
fn open_for_times(path: &Path) -> Result<File> {
    fs::OpenOptions::new()
        .write(true)
        .open(path)
        .map_err(|e| classify_io(&e))
}

#[cfg(unix)]
fn make_symlink(target: &Path, link_path: &Path) -> std::io::Result<()> {
    std::os::unix::fs::symlink(target, link_path)
}

#[cfg(windows)]
fn make_symlink(target: &Path, link_path: &Path) -> std::io::Result<()> {
    let base = link_path.parent().unwrap_or(Path::new("."));
    if base.join(target).is_dir() {
        std::os::windows::fs::symlink_dir(target, link_path)
    } else {
        std::os::windows::fs::symlink_file(target, link_path)
    }
}

#[cfg(not(any(unix, windows)))]
fn make_symlink(_target: &Path, _link_path: &Path) -> std::io::Result<()> {
    Err(std::io::Error::from(std::io::ErrorKind::Unsupported))
}
