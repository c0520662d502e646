//! Exit code constants for the `lfs-shim` CLI.
//!
//! - 0: Success
//! - 1: User error (bad args, invalid config, usage fault)
//! - 2: Lock failure (contended range, sentinel already present, lock not held)
//! - 3: I/O failure (everything the OS reported that is not a lock conflict)

/// Successful execution.
pub const SUCCESS: i32 = 0;

/// User error: bad arguments, invalid configuration, or a script usage fault.
pub const USER_ERROR: i32 = 1;

/// Lock failure: the range or directory is held elsewhere, or was not held.
pub const LOCK_FAILURE: i32 = 2;

/// I/O failure: descriptor, permission, or passthrough native errors.
pub const IO_FAILURE: i32 = 3;
