//! Directory locks.
//!
//! Byte-range locks cover files, so a directory is locked by atomically
//! creating a sentinel file inside it (`lockfile.lfs` by default). Whoever
//! creates the sentinel holds the lock; anyone else gets `FileExists`.
//!
//! # Strategies
//!
//! In descending preference:
//! - **hard_link**: write a private temp file, then `link()` it to the sentinel
//!   name. Falls back to `create_new` on filesystems without hard links.
//! - **create_exclusive** (Windows): exclusive create with no sharing and
//!   delete-on-close, so the sentinel vanishes when the handle closes.
//! - **create_new**: plain exclusive create.
//!
//! # Sentinel Metadata
//!
//! Unless disabled, sentinels contain JSON metadata:
//! - `owner`: The owner of the lock (e.g., `user@HOST`)
//! - `pid`: The process ID (optional)
//! - `created_at`: RFC3339 timestamp
//! - `strategy`: The strategy that created it
//!
//! # Release
//!
//! A [`DirLock`] is released by [`DirLock::free`], or by the reclamation
//! scheduler once the object is dropped. Removal failures are logged, never
//! raised. A process that dies first leaves an orphaned sentinel behind;
//! [`inspect`] and [`clear_stale`] exist for that case.

mod guard;
mod metadata;
mod operations;
mod strategy;
mod types;


// Re-export public API
pub use guard::DirLock;
pub use metadata::SentinelMetadata;
pub use operations::{clear_stale, inspect, lock_directory, sentinel_path};
pub use types::{DirLockStrategy, SentinelInfo};
