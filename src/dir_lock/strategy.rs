//! Atomic sentinel creation.

use super::metadata::SentinelMetadata;
use super::types::DirLockStrategy;
use crate::error::{LfsError, Result, classify_io};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

static NEXT_TEMP: AtomicU64 = AtomicU64::new(0);

/// A sentinel this process created.
#[derive(Debug)]
pub(crate) enum Sentinel {
    /// Removed by path on release.
    OnDisk(PathBuf),
    /// Deleted by the OS when `file` closes.
    Held { path: PathBuf, file: File },
}

impl Sentinel {
    pub(crate) fn path(&self) -> &Path {
        match self {
            Sentinel::OnDisk(path) => path,
            Sentinel::Held { path, .. } => path,
        }
    }

    pub(crate) fn remove(self) -> Result<()> {
        match self {
            Sentinel::OnDisk(path) => fs::remove_file(&path).map_err(|e| classify_io(&e)),
            Sentinel::Held { file, .. } => {
                drop(file);
                Ok(())
            }
        }
    }
}

/// Create the sentinel at `path`, failing with `FileExists` if one is present.
pub(crate) fn create(
    strategy: DirLockStrategy,
    path: &Path,
    write_metadata: bool,
) -> Result<Sentinel> {
    match strategy {
        DirLockStrategy::HardLink => create_hard_link(path, write_metadata),
        DirLockStrategy::CreateExclusive => create_exclusive(path),
        DirLockStrategy::CreateNew => create_new(path, write_metadata, DirLockStrategy::CreateNew),
    }
}

fn create_hard_link(path: &Path, write_metadata: bool) -> Result<Sentinel> {
    let temp = temp_path(path)?;
    create_new(&temp, write_metadata, DirLockStrategy::HardLink)?;

    let linked = fs::hard_link(&temp, path);
    let _ = fs::remove_file(&temp);

    match linked {
        Ok(()) => Ok(Sentinel::OnDisk(path.to_path_buf())),
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Err(LfsError::FileExists),
        Err(e) if links_unsupported(&e) => {
            debug!(error = %e, path = %path.display(), "hard links unavailable, using create_new");
            create_new(path, write_metadata, DirLockStrategy::CreateNew)
        }
        Err(e) => Err(classify_io(&e)),
    }
}

/// Exclusive create, writing and syncing metadata like any other lock file.
fn create_new(path: &Path, write_metadata: bool, strategy: DirLockStrategy) -> Result<Sentinel> {
    let mut file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .map_err(|e| {
            if e.kind() == io::ErrorKind::AlreadyExists {
                LfsError::FileExists
            } else {
                classify_io(&e)
            }
        })?;

    if write_metadata {
        let json = SentinelMetadata::current(strategy).encode()?;
        let written = file
            .write_all(json.as_bytes())
            .and_then(|()| file.sync_all());
        if let Err(e) = written {
            // Clean up the sentinel on write failure
            let _ = fs::remove_file(path);
            return Err(classify_io(&e));
        }
    }

    Ok(Sentinel::OnDisk(path.to_path_buf()))
}

#[cfg(windows)]
fn create_exclusive(path: &Path) -> Result<Sentinel> {
    use std::os::windows::fs::OpenOptionsExt;

    const FILE_FLAG_DELETE_ON_CLOSE: u32 = 0x0400_0000;
    const ERROR_SHARING_VIOLATION: i32 = 32;

    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .create_new(true)
        .share_mode(0)
        .custom_flags(FILE_FLAG_DELETE_ON_CLOSE)
        .open(path)
        .map_err(|e| {
            if e.kind() == io::ErrorKind::AlreadyExists
                || e.raw_os_error() == Some(ERROR_SHARING_VIOLATION)
            {
                LfsError::FileExists
            } else {
                classify_io(&e)
            }
        })?;

    Ok(Sentinel::Held {
        path: path.to_path_buf(),
        file,
    })
}

#[cfg(not(windows))]
fn create_exclusive(_path: &Path) -> Result<Sentinel> {
    Err(LfsError::NotSupported)
}

/// Private name next to the sentinel: `.{name}.{pid}.{n}.tmp`.
fn temp_path(path: &Path) -> Result<PathBuf> {
    let parent = path.parent().unwrap_or(Path::new("."));
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or(LfsError::InvalidArgument)?;
    let n = NEXT_TEMP.fetch_add(1, Ordering::Relaxed);
    Ok(parent.join(format!(".{}.{}.{}.tmp", name, std::process::id(), n)))
}

#[cfg(unix)]
fn links_unsupported(err: &io::Error) -> bool {
    matches!(
        err.raw_os_error(),
        Some(libc::EPERM) | Some(libc::EOPNOTSUPP) | Some(libc::EXDEV) | Some(libc::EMLINK)
    )
}

#[cfg(not(unix))]
fn links_unsupported(err: &io::Error) -> bool {
    err.kind() == io::ErrorKind::Unsupported
}
