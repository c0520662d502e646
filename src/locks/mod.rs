//! Advisory byte-range locking.
//!
//! Scripts lock `(file, start, len)` windows in shared (`"r"`) or exclusive
//! (`"w"`) mode. A [`LockRegistry`] remembers which locks this process holds and
//! hands each one to the reclamation scheduler, while a [`LockDriver`] performs
//! the platform calls.
//!
//! # Drivers
//!
//! - **posix**: `fcntl` record locks (open-file-description locks on Linux).
//! - **windows**: `LockFileEx` for native handles, `_locking` for C-runtime
//!   descriptors.
//! - **fallback**: OS range locks through `file-guard`, plus a process-local
//!   table so handles within one process contend too.
//!
//! # Ranges
//!
//! A length of zero means "from `start` to end of file, however large it grows".
//! Negative offsets are rejected with `InvalidArgument` before any driver runs.

pub mod driver;
mod registry;
mod types;


// Re-export public API
pub use driver::{LockDriver, detect, select};
pub use registry::LockRegistry;
pub use types::{LockKey, LockMode, LockOp, LockRange, PlatformLock};
