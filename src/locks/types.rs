//! Lock modes, byte ranges, and registry keys.

use crate::error::{LfsError, Result};
use crate::file::{FileHandle, NativeHandle};

/// Kind of byte-range lock to take.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LockMode {
    /// Read lock; compatible with other shared locks.
    Shared,
    /// Write lock; compatible with nothing.
    Exclusive,
}

impl LockMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            LockMode::Shared => "r",
            LockMode::Exclusive => "w",
        }
    }

    /// Whether a lock of this mode can coexist with one of `other` on an overlapping range.
    pub fn compatible_with(&self, other: LockMode) -> bool {
        matches!((self, other), (LockMode::Shared, LockMode::Shared))
    }
}

/// What a script's `lock` call asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockOp {
    Acquire(LockMode),
    Unlock,
}

impl LockOp {
    /// Parse a script mode string. Only the first character is significant.
    pub fn parse(mode: &str) -> Result<Self> {
        match mode.as_bytes().first() {
            Some(b'r') => Ok(LockOp::Acquire(LockMode::Shared)),
            Some(b'w') => Ok(LockOp::Acquire(LockMode::Exclusive)),
            Some(b'u') => Ok(LockOp::Unlock),
            _ => Err(LfsError::InvalidMode("lock")),
        }
    }
}

/// A byte window of a file. A length of zero extends to end-of-file and beyond.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LockRange {
    pub start: u64,
    pub len: u64,
}

impl LockRange {
    /// Validate script-supplied offsets.
    ///
    /// A negative `len` is rejected on every driver, including POSIX where
    /// `fcntl` would read it as the span ending at `start`.
    pub fn new(start: i64, len: i64) -> Result<Self> {
        if start < 0 || len < 0 {
            return Err(LfsError::InvalidArgument);
        }
        Ok(Self {
            start: start as u64,
            len: len as u64,
        })
    }

    /// The whole file, as locked by `lock(fh, mode)` with no offsets.
    pub fn whole_file() -> Self {
        Self { start: 0, len: 0 }
    }

    pub fn is_whole_file(&self) -> bool {
        self.start == 0 && self.len == 0
    }

    /// Exclusive end offset, or `None` when the range is unbounded.
    pub fn end(&self) -> Option<u64> {
        match self.len {
            0 => None,
            len => Some(self.start.saturating_add(len)),
        }
    }

    pub fn overlaps(&self, other: &LockRange) -> bool {
        let starts_before_other_ends = match other.end() {
            Some(end) => self.start < end,
            None => true,
        };
        let ends_after_other_starts = match self.end() {
            Some(end) => end > other.start,
            None => true,
        };
        starts_before_other_ends && ends_after_other_starts
    }
}

/// Registry key: one open-file identity plus an exact range.
///
/// Two handles opened on the same path are distinct identities and never share a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LockKey {
    pub file: u64,
    pub range: LockRange,
}

impl LockKey {
    pub fn new(file: &FileHandle, range: LockRange) -> Self {
        Self {
            file: file.id(),
            range,
        }
    }
}

/// Record of a lock a driver acquired, handed back to it for release.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformLock {
    /// Identity of the file handle the lock was taken through.
    pub file: u64,
    pub mode: LockMode,
    pub range: LockRange,
    /// Native handle or descriptor the lock was taken on, if any.
    pub native: Option<NativeHandle>,
}

impl PlatformLock {
    pub fn key(&self) -> LockKey {
        LockKey {
            file: self.file,
            range: self.range,
        }
    }
}
