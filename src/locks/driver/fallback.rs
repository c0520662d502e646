//! Runtime-managed range locking for hosts without a dedicated driver.
//!
//! Every range is taken on the OS through `file-guard`, which uses the
//! process-associated primitive of the host (`F_SETLK` on unix, `LockFileEx` on
//! Windows). Those locks never conflict inside one process, so ranges are also
//! tracked in a table keyed by the identity of the underlying file; two handles
//! opened on the same path see each other's locks there. On Linux, whole-file
//! locks are additionally taken with `fs2` so `flock` users see them too.
//!
//! Process-associated locks have one sharp edge: closing any descriptor on a
//! file drops every OS lock this process holds on it. The table still reports
//! in-process conflicts after that.

use super::LockDriver;
use crate::error::{LfsError, Result, classify_io};
use crate::file::FileHandle;
use crate::locks::types::{LockMode, LockRange, PlatformLock};
use crate::reclaim::lock_unpoisoned;
use file_guard::Lock;
use std::collections::HashMap;
use std::fs::File;
use std::io;
use std::sync::Mutex;
use tracing::{debug, warn};

/// Largest offset an OS range lock can name.
const OS_MAX_OFFSET: u64 = i64::MAX as u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum FileIdentity {
    /// Device and inode of the underlying file.
    Inode(u64, u64),
    /// No stable host identity; the handle itself is the identity.
    Handle(u64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Held {
    holder: u64,
    mode: LockMode,
    range: LockRange,
}

#[derive(Debug, Default)]
pub struct FallbackDriver {
    table: Mutex<HashMap<FileIdentity, Vec<Held>>>,
}

impl FallbackDriver {
    pub fn new() -> Self {
        Self::default()
    }

    fn remove(&self, identity: FileIdentity, entry: &Held) -> bool {
        let mut table = lock_unpoisoned(&self.table);
        let Some(held) = table.get_mut(&identity) else {
            return false;
        };
        let Some(index) = held.iter().position(|h| h == entry) else {
            return false;
        };
        held.swap_remove(index);
        if held.is_empty() {
            table.remove(&identity);
        }
        true
    }

    /// Ranges still recorded on `identity` that overlap `range`, shared first.
    fn survivors(&self, identity: FileIdentity, range: LockRange) -> Vec<Held> {
        let table = lock_unpoisoned(&self.table);
        let mut survivors: Vec<Held> = table
            .get(&identity)
            .map(|held| {
                held.iter()
                    .filter(|h| h.range.overlaps(&range))
                    .copied()
                    .collect()
            })
            .unwrap_or_default();
        survivors.sort_by_key(|h| h.mode == LockMode::Exclusive);
        survivors
    }

    /// Number of ranges currently recorded, across all files.
    pub fn held_count(&self) -> usize {
        lock_unpoisoned(&self.table).values().map(Vec::len).sum()
    }
}

impl LockDriver for FallbackDriver {
    fn name(&self) -> &'static str {
        "fallback"
    }

    fn acquire(
        &self,
        file: &FileHandle,
        mode: LockMode,
        range: LockRange,
    ) -> Result<PlatformLock> {
        let channel = file.file().channel().ok_or(LfsError::NotSupported)?;
        let identity = identity_of(file, channel)?;
        let wanted = Held {
            holder: file.id(),
            mode,
            range,
        };

        {
            let mut table = lock_unpoisoned(&self.table);
            let held = table.entry(identity).or_default();
            let conflict = held.iter().any(|h| {
                h.holder != wanted.holder
                    && h.range.overlaps(&range)
                    && !h.mode.compatible_with(mode)
            });
            if conflict {
                return Err(LfsError::contended());
            }
            held.push(wanted);
        }

        if let Err(e) = os_lock(channel, Some(mode), range) {
            self.remove(identity, &wanted);
            return Err(e);
        }
        if range.is_whole_file()
            && let Err(e) = whole_file_lock(channel, mode)
        {
            self.remove(identity, &wanted);
            let _ = os_lock(channel, None, range);
            return Err(e);
        }
        debug!(
            holder = wanted.holder,
            mode = mode.as_str(),
            start = range.start,
            len = range.len,
            "fallback lock taken"
        );

        Ok(PlatformLock {
            file: file.id(),
            mode,
            range,
            native: None,
        })
    }

    fn release(&self, file: &FileHandle, lock: &PlatformLock) -> Result<()> {
        let channel = file.file().channel().ok_or(LfsError::NotSupported)?;
        let identity = identity_of(file, channel)?;

        let recorded = Held {
            holder: lock.file,
            mode: lock.mode,
            range: lock.range,
        };
        if !self.remove(identity, &recorded) {
            return Err(self.not_held());
        }

        if lock.range.is_whole_file() {
            whole_file_unlock(channel)?;
        }
        os_lock(channel, None, lock.range)?;

        // The OS keeps one lock per byte for the whole process, so the unlock
        // above also dropped overlapping ranges other handles still hold.
        for survivor in self.survivors(identity, lock.range) {
            if let Err(e) = os_lock(channel, Some(survivor.mode), survivor.range) {
                warn!(
                    holder = survivor.holder,
                    start = survivor.range.start,
                    len = survivor.range.len,
                    error = %e,
                    "could not restore overlapping lock"
                );
            }
        }
        Ok(())
    }

    fn forget(&self, lock: &PlatformLock) {
        let mut table = lock_unpoisoned(&self.table);
        table.retain(|_, held| {
            held.retain(|h| !(h.holder == lock.file && h.range == lock.range));
            !held.is_empty()
        });
    }
}

/// Offset and length of `range` as the OS sees it; zero length runs to the end.
fn os_span(range: LockRange) -> Result<(usize, usize)> {
    if range.start >= OS_MAX_OFFSET {
        return Err(LfsError::InvalidArgument);
    }
    let room = OS_MAX_OFFSET - range.start;
    let len = match range.len {
        0 => room,
        len => len.min(room),
    };
    let start = usize::try_from(range.start).map_err(|_| LfsError::InvalidArgument)?;
    Ok((start, usize::try_from(len).unwrap_or(usize::MAX)))
}

/// Take (`Some`) or drop (`None`) an OS range lock without waiting.
fn os_lock(channel: &File, mode: Option<LockMode>, range: LockRange) -> Result<()> {
    let (start, len) = os_span(range)?;
    let lock = mode.map(|mode| match mode {
        LockMode::Shared => Lock::Shared,
        LockMode::Exclusive => Lock::Exclusive,
    });
    // SAFETY: `channel` is a live open file for the whole call; the lock is
    // tracked in the table and released through this driver, not a guard.
    let result = unsafe { file_guard::os::raw_file_lock(channel, lock, start, len, false) };
    result.map_err(|e| classify_lock_error(&e))
}

#[cfg(target_os = "linux")]
fn whole_file_lock(channel: &File, mode: LockMode) -> Result<()> {
    use fs2::FileExt;
    let attempt = match mode {
        LockMode::Shared => FileExt::try_lock_shared(channel),
        LockMode::Exclusive => FileExt::try_lock_exclusive(channel),
    };
    attempt.map_err(|e| classify_lock_error(&e))
}

#[cfg(not(target_os = "linux"))]
fn whole_file_lock(_channel: &File, _mode: LockMode) -> Result<()> {
    Ok(())
}

#[cfg(target_os = "linux")]
fn whole_file_unlock(channel: &File) -> Result<()> {
    fs2::FileExt::unlock(channel).map_err(|e| classify_io(&e))
}

#[cfg(not(target_os = "linux"))]
fn whole_file_unlock(_channel: &File) -> Result<()> {
    Ok(())
}

fn classify_lock_error(err: &io::Error) -> LfsError {
    if is_contention(err) {
        LfsError::contended()
    } else {
        classify_io(err)
    }
}

fn is_contention(err: &io::Error) -> bool {
    if err.kind() == io::ErrorKind::WouldBlock {
        return true;
    }
    #[cfg(unix)]
    {
        err.raw_os_error() == Some(libc::EACCES) || err.raw_os_error() == Some(libc::EAGAIN)
    }
    #[cfg(windows)]
    {
        // ERROR_LOCK_VIOLATION, ERROR_IO_PENDING
        matches!(err.raw_os_error(), Some(33) | Some(997))
    }
    #[cfg(not(any(unix, windows)))]
    {
        false
    }
}

#[cfg(unix)]
fn identity_of(_file: &FileHandle, channel: &File) -> Result<FileIdentity> {
    use std::os::unix::fs::MetadataExt;
    let meta = channel.metadata().map_err(|e| classify_io(&e))?;
    Ok(FileIdentity::Inode(meta.dev(), meta.ino()))
}

#[cfg(not(unix))]
fn identity_of(file: &FileHandle, _channel: &File) -> Result<FileIdentity> {
    Ok(FileIdentity::Handle(file.id()))
}
