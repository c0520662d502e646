//! Windows byte-range locks.
//!
//! Files that expose a native `HANDLE` are locked with `LockFileEx`, which knows
//! shared from exclusive. Files that only expose a C-runtime descriptor go
//! through `_locking`, which has a single non-shared mode and locks from the
//! descriptor's current position, so the position is moved and restored around
//! the call. The choice is made per call.

use super::{LockDriver, native_for_release, native_of};
use crate::error::{LfsError, Result, classify_io, native_message};
use crate::file::{FileHandle, NativeHandle};
use crate::locks::types::{LockMode, LockRange, PlatformLock};
use std::borrow::Cow;
use std::ffi::{CStr, c_char, c_int, c_long};
use std::io;
use tracing::debug;

const LOCKFILE_FAIL_IMMEDIATELY: u32 = 0x1;
const LOCKFILE_EXCLUSIVE_LOCK: u32 = 0x2;

const ERROR_INVALID_HANDLE: u32 = 6;
const ERROR_LOCK_VIOLATION: u32 = 33;
const ERROR_NOT_LOCKED: u32 = 158;
const ERROR_IO_PENDING: u32 = 997;

const LK_UNLCK: c_int = 0;
const LK_NBLCK: c_int = 2;
const SEEK_SET: c_int = 0;
const SEEK_CUR: c_int = 1;

const EBADF: c_int = 9;
const EACCES: c_int = 13;
const EDEADLOCK: c_int = 36;
const EINVAL: c_int = 22;

#[repr(C)]
struct Overlapped {
    internal: usize,
    internal_high: usize,
    offset: u32,
    offset_high: u32,
    h_event: isize,
}

#[link(name = "kernel32")]
unsafe extern "system" {
    fn LockFileEx(
        hFile: isize,
        dwFlags: u32,
        dwReserved: u32,
        nNumberOfBytesToLockLow: u32,
        nNumberOfBytesToLockHigh: u32,
        lpOverlapped: *mut Overlapped,
    ) -> i32;

    fn UnlockFileEx(
        hFile: isize,
        dwReserved: u32,
        nNumberOfBytesToUnlockLow: u32,
        nNumberOfBytesToUnlockHigh: u32,
        lpOverlapped: *mut Overlapped,
    ) -> i32;

    fn GetLastError() -> u32;
}

unsafe extern "C" {
    fn _locking(fd: c_int, mode: c_int, nbytes: c_long) -> c_int;
    fn _lseeki64(fd: c_int, offset: i64, origin: c_int) -> i64;
    fn _errno() -> *mut c_int;
    fn strerror(errnum: c_int) -> *const c_char;
}

#[derive(Debug, Default)]
pub struct WindowsDriver;

impl WindowsDriver {
    pub fn new() -> Self {
        Self
    }
}

impl LockDriver for WindowsDriver {
    fn name(&self) -> &'static str {
        "windows"
    }

    fn acquire(
        &self,
        file: &FileHandle,
        mode: LockMode,
        range: LockRange,
    ) -> Result<PlatformLock> {
        let native = native_of(file)?;
        match native {
            NativeHandle::Handle(handle) => lock_handle(handle, mode, range)?,
            NativeHandle::Descriptor(fd) => locking(file, fd, LK_NBLCK, range)?,
        }
        debug!(?native, mode = mode.as_str(), start = range.start, len = range.len, "windows lock taken");

        Ok(PlatformLock {
            file: file.id(),
            mode,
            range,
            native: Some(native),
        })
    }

    fn release(&self, file: &FileHandle, lock: &PlatformLock) -> Result<()> {
        match native_for_release(file, lock)? {
            NativeHandle::Handle(handle) => unlock_handle(handle, lock.range),
            NativeHandle::Descriptor(fd) => locking(file, fd, LK_UNLCK, lock.range),
        }
    }

    fn not_held(&self) -> LfsError {
        segment_unlocked()
    }
}

fn lock_handle(handle: isize, mode: LockMode, range: LockRange) -> Result<()> {
    let mut flags = LOCKFILE_FAIL_IMMEDIATELY;
    if mode == LockMode::Exclusive {
        flags |= LOCKFILE_EXCLUSIVE_LOCK;
    }
    let mut overlapped = overlapped_at(range.start);
    let (low, high) = split(handle_len(range));

    // SAFETY: `overlapped` is a zeroed OVERLAPPED that lives across the call; with
    // LOCKFILE_FAIL_IMMEDIATELY the call completes synchronously.
    let ok = unsafe { LockFileEx(handle, flags, 0, low, high, &mut overlapped) };
    if ok != 0 {
        return Ok(());
    }

    // SAFETY: reads the calling thread's last-error value.
    match unsafe { GetLastError() } {
        ERROR_LOCK_VIOLATION | ERROR_IO_PENDING => Err(LfsError::LockContended {
            message: Cow::Borrowed("Overlapped I/O operation is in progress."),
            code: Some(ERROR_IO_PENDING as i64),
        }),
        ERROR_INVALID_HANDLE => Err(invalid_handle()),
        code => Err(LfsError::native(code as i64)),
    }
}

fn unlock_handle(handle: isize, range: LockRange) -> Result<()> {
    let mut overlapped = overlapped_at(range.start);
    let (low, high) = split(handle_len(range));

    // SAFETY: as in `lock_handle`.
    let ok = unsafe { UnlockFileEx(handle, 0, low, high, &mut overlapped) };
    if ok != 0 {
        return Ok(());
    }

    // SAFETY: reads the calling thread's last-error value.
    match unsafe { GetLastError() } {
        ERROR_NOT_LOCKED => Err(segment_unlocked()),
        ERROR_INVALID_HANDLE => Err(invalid_handle()),
        code => Err(LfsError::native(code as i64)),
    }
}

/// `_locking` from `range.start`, restoring the descriptor position afterwards.
fn locking(file: &FileHandle, fd: c_int, mode: c_int, range: LockRange) -> Result<()> {
    let nbytes = match range.len {
        0 => c_long::MAX,
        len => c_long::try_from(len).map_err(|_| LfsError::InvalidArgument)?,
    };
    let start = i64::try_from(range.start).map_err(|_| LfsError::InvalidArgument)?;

    let saved = get_position(file, fd)?;
    set_position(file, fd, start)?;
    // SAFETY: `_locking` only reads its integer arguments.
    let rc = unsafe { _locking(fd, mode, nbytes) };
    let errno = if rc == -1 { last_errno() } else { 0 };
    set_position(file, fd, saved)?;

    match rc {
        -1 => Err(classify_errno(errno)),
        _ => Ok(()),
    }
}

fn get_position(file: &FileHandle, fd: c_int) -> Result<i64> {
    match file.file().position() {
        Ok(pos) => i64::try_from(pos).map_err(|_| LfsError::InvalidArgument),
        Err(e) if e.kind() == io::ErrorKind::Unsupported => {
            // SAFETY: `_lseeki64` with offset 0 from SEEK_CUR only reports the position.
            let pos = unsafe { _lseeki64(fd, 0, SEEK_CUR) };
            if pos < 0 {
                Err(classify_errno(last_errno()))
            } else {
                Ok(pos)
            }
        }
        Err(e) => Err(classify_io(&e)),
    }
}

fn set_position(file: &FileHandle, fd: c_int, pos: i64) -> Result<()> {
    match file.file().set_position(pos as u64) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::Unsupported => {
            // SAFETY: `_lseeki64` only reads its integer arguments.
            if unsafe { _lseeki64(fd, pos, SEEK_SET) } < 0 {
                Err(classify_errno(last_errno()))
            } else {
                Ok(())
            }
        }
        Err(e) => Err(classify_io(&e)),
    }
}

fn classify_errno(errno: c_int) -> LfsError {
    match errno {
        EACCES | EDEADLOCK => LfsError::PermissionDenied,
        EBADF => LfsError::bad_descriptor(),
        EINVAL => LfsError::InvalidArgument,
        code => LfsError::UnknownNative {
            code: code as i64,
            message: crt_message(code),
        },
    }
}

fn last_errno() -> c_int {
    // SAFETY: `_errno` returns the calling thread's errno slot, valid for the thread's life.
    unsafe { *_errno() }
}

fn crt_message(errno: c_int) -> String {
    // SAFETY: `strerror` returns a pointer to a NUL-terminated static or thread-local buffer.
    let ptr = unsafe { strerror(errno) };
    if ptr.is_null() {
        return native_message(errno as i64);
    }
    // SAFETY: checked non-null above; the buffer is NUL-terminated.
    unsafe { CStr::from_ptr(ptr) }.to_string_lossy().into_owned()
}

fn invalid_handle() -> LfsError {
    LfsError::BadDescriptor {
        message: Cow::Borrowed("The handle is invalid."),
        code: Some(ERROR_INVALID_HANDLE as i64),
    }
}

fn segment_unlocked() -> LfsError {
    LfsError::NotHeld {
        message: Cow::Borrowed("The segment is already unlocked."),
        code: Some(ERROR_NOT_LOCKED as i64),
    }
}

fn overlapped_at(offset: u64) -> Overlapped {
    let (low, high) = split(offset);
    Overlapped {
        internal: 0,
        internal_high: 0,
        offset: low,
        offset_high: high,
        h_event: 0,
    }
}

/// Zero length means the rest of the file, which `LockFileEx` spells as the largest count.
fn handle_len(range: LockRange) -> u64 {
    match range.len {
        0 => u64::MAX,
        len => len,
    }
}

fn split(value: u64) -> (u32, u32) {
    (value as u32, (value >> 32) as u32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FailureKind;
    use crate::test_support::open_rw;
    use tempfile::TempDir;

    #[test]
    fn test_split_and_unbounded_length() {
        assert_eq!(split(0x1_0000_0002), (2, 1));
        assert_eq!(handle_len(LockRange::whole_file()), u64::MAX);
        assert_eq!(handle_len(LockRange::new(4, 10).unwrap()), 10);
    }

    #[test]
    fn test_handle_locks_conflict_across_handles() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("data.bin");
        let driver = WindowsDriver::new();
        let a = FileHandle::from(open_rw(&path, 64));
        let b = FileHandle::from(open_rw(&path, 64));
        let range = LockRange::new(0, 16).unwrap();

        let lock = driver.acquire(&a, LockMode::Exclusive, range).unwrap();
        let err = driver.acquire(&b, LockMode::Shared, range).unwrap_err();
        assert_eq!(err.kind(), FailureKind::LockContended);
        assert_eq!(err.code(), Some(997));

        driver.release(&a, &lock).unwrap();
        let err = driver.release(&a, &lock).unwrap_err();
        assert_eq!(err.kind(), FailureKind::NotHeld);
        assert_eq!(err.code(), Some(158));
    }
}
