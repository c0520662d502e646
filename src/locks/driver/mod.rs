//! Platform lock drivers.
//!
//! Exactly one driver is active per registry, chosen once from configuration or
//! by probing the host. Every driver maps its native failures onto the shared
//! [`LfsError`] vocabulary so scripts see the same shapes everywhere.

mod fallback;
#[cfg(unix)]
mod posix;
#[cfg(windows)]
mod windows;

pub use fallback::FallbackDriver;
#[cfg(unix)]
pub use posix::PosixDriver;
#[cfg(windows)]
pub use windows::WindowsDriver;

use super::types::{LockMode, LockRange, PlatformLock};
use crate::config::DriverChoice;
use crate::error::{LfsError, Result, classify_io};
use crate::file::{FileHandle, NativeHandle};
use std::fmt;
use std::sync::Arc;
use tracing::info;

/// One locking strategy.
pub trait LockDriver: Send + Sync + fmt::Debug {
    /// Short name shown by `detect` and in logs.
    fn name(&self) -> &'static str;

    /// Try to take `mode` over `range`, failing immediately on contention.
    fn acquire(&self, file: &FileHandle, mode: LockMode, range: LockRange)
    -> Result<PlatformLock>;

    /// Release a lock this driver acquired through `file`.
    fn release(&self, file: &FileHandle, lock: &PlatformLock) -> Result<()>;

    /// Drop bookkeeping for a lock whose file is already gone.
    ///
    /// Native locks die with their descriptor, so the default does nothing.
    fn forget(&self, _lock: &PlatformLock) {}

    /// Failure reported when a script unlocks a range it never locked.
    fn not_held(&self) -> LfsError {
        LfsError::not_held()
    }
}

/// Pick the driver named by `choice`, or detect the host for `auto`.
pub fn select(choice: DriverChoice) -> Result<Arc<dyn LockDriver>> {
    let driver: Arc<dyn LockDriver> = match choice {
        DriverChoice::Auto => detect(),
        DriverChoice::Posix => posix_driver()?,
        DriverChoice::Windows => windows_driver()?,
        DriverChoice::Fallback => Arc::new(FallbackDriver::new()),
    };
    info!(driver = driver.name(), requested = choice.as_str(), "lock driver selected");
    Ok(driver)
}

/// The strongest driver the host supports.
pub fn detect() -> Arc<dyn LockDriver> {
    #[cfg(unix)]
    {
        Arc::new(PosixDriver::new())
    }
    #[cfg(windows)]
    {
        Arc::new(WindowsDriver::new())
    }
    #[cfg(not(any(unix, windows)))]
    {
        Arc::new(FallbackDriver::new())
    }
}

#[cfg(unix)]
fn posix_driver() -> Result<Arc<dyn LockDriver>> {
    Ok(Arc::new(PosixDriver::new()))
}

#[cfg(not(unix))]
fn posix_driver() -> Result<Arc<dyn LockDriver>> {
    Err(LfsError::Config(
        "driver 'posix' is not available on this platform".to_string(),
    ))
}

#[cfg(windows)]
fn windows_driver() -> Result<Arc<dyn LockDriver>> {
    Ok(Arc::new(WindowsDriver::new()))
}

#[cfg(not(windows))]
fn windows_driver() -> Result<Arc<dyn LockDriver>> {
    Err(LfsError::Config(
        "driver 'windows' is not available on this platform".to_string(),
    ))
}

/// The native handle or descriptor of `file`, or `NotSupported` if it has none.
pub(crate) fn native_of(file: &FileHandle) -> Result<NativeHandle> {
    match file.file().native() {
        Ok(Some(native)) => Ok(native),
        Ok(None) => Err(LfsError::NotSupported),
        Err(e) => Err(classify_io(&e)),
    }
}

/// The primitive `lock` was taken through, so it is released through the same one.
pub(crate) fn native_for_release(file: &FileHandle, lock: &PlatformLock) -> Result<NativeHandle> {
    match lock.native {
        Some(native) => Ok(native),
        None => native_of(file),
    }
}
