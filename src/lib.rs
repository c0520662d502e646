//! lfs-shim: the LuaFileSystem surface on top of host file locks.
//!
//! A script state talks to [`lfs::Lfs`], which routes byte-range locks
//! through a [`locks::LockRegistry`] and a platform [`locks::LockDriver`],
//! directory locks through [`dir_lock`], and everything else through the
//! path helpers in [`fs`]. Every lock a script can forget about is tracked by
//! the [`reclaim::Scheduler`], which releases it once the owning object is
//! dropped or the process shuts down.

pub mod config;
pub mod dir_lock;
pub mod error;
pub mod exit_codes;
pub mod file;
pub mod fs;
pub mod lfs;
pub mod locks;
pub mod reclaim;

#[cfg(test)]
mod test_support;

pub use error::{LfsError, Result};
pub use lfs::{Lfs, Reply, ScriptValue};
