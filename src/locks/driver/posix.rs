//! Advisory record locks via `fcntl`.
//!
//! On Linux the open-file-description commands are used, so two descriptors
//! opened separately within one process contend with each other just as two
//! processes would. Elsewhere classic process-scoped `F_SETLK` is used.

use super::{LockDriver, native_for_release, native_of};
use crate::error::{LfsError, Result};
use crate::file::{FileHandle, NativeHandle};
use crate::locks::types::{LockMode, LockRange, PlatformLock};
use std::io;
use tracing::debug;

#[cfg(target_os = "linux")]
const SETLK: libc::c_int = libc::F_OFD_SETLK;
#[cfg(not(target_os = "linux"))]
const SETLK: libc::c_int = libc::F_SETLK;

#[derive(Debug, Default)]
pub struct PosixDriver;

impl PosixDriver {
    pub fn new() -> Self {
        Self
    }
}

impl LockDriver for PosixDriver {
    fn name(&self) -> &'static str {
        "posix"
    }

    fn acquire(
        &self,
        file: &FileHandle,
        mode: LockMode,
        range: LockRange,
    ) -> Result<PlatformLock> {
        let fd = descriptor_of(file)?;
        let l_type = match mode {
            LockMode::Shared => libc::F_RDLCK as i32,
            LockMode::Exclusive => libc::F_WRLCK as i32,
        };
        set_lock(fd, l_type, range).map_err(|e| classify_fcntl(&e))?;
        debug!(fd, mode = mode.as_str(), start = range.start, len = range.len, "fcntl lock taken");

        Ok(PlatformLock {
            file: file.id(),
            mode,
            range,
            native: Some(NativeHandle::Descriptor(fd)),
        })
    }

    fn release(&self, file: &FileHandle, lock: &PlatformLock) -> Result<()> {
        let fd = match native_for_release(file, lock)? {
            NativeHandle::Descriptor(fd) => fd,
            NativeHandle::Handle(_) => return Err(LfsError::NotSupported),
        };
        set_lock(fd, libc::F_UNLCK as i32, lock.range).map_err(|e| classify_fcntl(&e))
    }
}

fn descriptor_of(file: &FileHandle) -> Result<libc::c_int> {
    match native_of(file)? {
        NativeHandle::Descriptor(fd) => Ok(fd),
        NativeHandle::Handle(_) => Err(LfsError::NotSupported),
    }
}

fn set_lock(fd: libc::c_int, l_type: i32, range: LockRange) -> io::Result<()> {
    let start = libc::off_t::try_from(range.start)
        .map_err(|_| io::Error::from_raw_os_error(libc::EINVAL))?;
    let len = libc::off_t::try_from(range.len)
        .map_err(|_| io::Error::from_raw_os_error(libc::EINVAL))?;

    // SAFETY: `flock` is plain old data; zero is a valid value for every field,
    // and open-file-description locks require `l_pid` to be zero.
    let mut request: libc::flock = unsafe { std::mem::zeroed() };
    request.l_type = l_type as _;
    request.l_whence = libc::SEEK_SET as _;
    request.l_start = start;
    request.l_len = len;

    // SAFETY: `request` is a valid, initialised `flock` that outlives the call.
    let rc = unsafe { libc::fcntl(fd, SETLK, &request as *const libc::flock) };
    if rc == -1 {
        Err(io::Error::last_os_error())
    } else {
        Ok(())
    }
}

/// Contention is told apart from structural errors; anything else passes through.
fn classify_fcntl(err: &io::Error) -> LfsError {
    match err.raw_os_error() {
        Some(libc::EAGAIN) | Some(libc::EACCES) => LfsError::contended(),
        Some(libc::EBADF) => LfsError::bad_descriptor(),
        Some(libc::EINVAL) => LfsError::InvalidArgument,
        Some(code) => LfsError::native(code as i64),
        None => LfsError::Io {
            message: err.to_string(),
            code: None,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FailureKind;
    use crate::file::RawDescriptor;
    use crate::test_support::open_rw;
    use tempfile::TempDir;

    #[test]
    fn test_fcntl_errors_are_classified() {
        let again = io::Error::from_raw_os_error(libc::EAGAIN);
        assert_eq!(classify_fcntl(&again).kind(), FailureKind::LockContended);

        let acces = io::Error::from_raw_os_error(libc::EACCES);
        assert_eq!(classify_fcntl(&acces).kind(), FailureKind::LockContended);

        let badf = io::Error::from_raw_os_error(libc::EBADF);
        let classified = classify_fcntl(&badf);
        assert_eq!(classified.kind(), FailureKind::BadDescriptor);
        assert_eq!(classified.code(), Some(77));

        let nolck = io::Error::from_raw_os_error(libc::ENOLCK);
        let classified = classify_fcntl(&nolck);
        assert_eq!(classified.kind(), FailureKind::UnknownNative);
        assert_eq!(classified.code(), Some(libc::ENOLCK as i64));
    }

    #[test]
    fn test_closed_descriptor_is_bad_descriptor() {
        let driver = PosixDriver::new();
        let file = FileHandle::new(RawDescriptor(-1));

        let err = driver
            .acquire(&file, LockMode::Exclusive, LockRange::whole_file())
            .unwrap_err();
        assert_eq!(err.kind(), FailureKind::BadDescriptor);
    }

    #[test]
    fn test_shared_locks_coexist_and_exclusive_conflicts() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("data.bin");
        let driver = PosixDriver::new();
        let a = FileHandle::from(open_rw(&path, 64));
        let b = FileHandle::from(open_rw(&path, 64));
        let range = LockRange::new(0, 16).unwrap();

        let lock_a = driver.acquire(&a, LockMode::Shared, range).unwrap();
        let lock_b = driver.acquire(&b, LockMode::Shared, range).unwrap();
        driver.release(&b, &lock_b).unwrap();

        #[cfg(target_os = "linux")]
        {
            let err = driver
                .acquire(&b, LockMode::Exclusive, LockRange::new(8, 4).unwrap())
                .unwrap_err();
            assert_eq!(err.kind(), FailureKind::LockContended);
        }

        driver.release(&a, &lock_a).unwrap();
        let lock_b = driver.acquire(&b, LockMode::Exclusive, range).unwrap();
        driver.release(&b, &lock_b).unwrap();
    }

    /// Reports its descriptor once, then stops exposing one.
    struct Flaky {
        file: std::fs::File,
        used: std::sync::atomic::AtomicBool,
    }

    impl crate::file::OpenFile for Flaky {
        fn native(&self) -> io::Result<Option<NativeHandle>> {
            use std::os::fd::AsRawFd;
            use std::sync::atomic::Ordering;
            if self.used.swap(true, Ordering::SeqCst) {
                Ok(None)
            } else {
                Ok(Some(NativeHandle::Descriptor(self.file.as_raw_fd())))
            }
        }
    }

    #[test]
    fn test_release_uses_descriptor_the_lock_was_taken_on() {
        let temp_dir = TempDir::new().unwrap();
        let driver = PosixDriver::new();
        let file = FileHandle::new(Flaky {
            file: open_rw(&temp_dir.path().join("data.bin"), 8),
            used: std::sync::atomic::AtomicBool::new(false),
        });

        let lock = driver
            .acquire(&file, LockMode::Exclusive, LockRange::new(0, 4).unwrap())
            .unwrap();
        assert!(matches!(lock.native, Some(NativeHandle::Descriptor(_))));
        driver.release(&file, &lock).unwrap();
    }
}
