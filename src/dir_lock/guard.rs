//! The script-visible directory lock object.

use super::strategy::Sentinel;
use crate::error::Result;
use crate::reclaim::{Owner, Scheduler, TrackedHandle};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// A held directory lock.
///
/// The sentinel is removed exactly once: by [`DirLock::free`], by the collector
/// after the lock object is dropped, or by the exit drain.
#[derive(Debug)]
pub struct DirLock {
    /// Path to the sentinel file.
    path: PathBuf,

    // Dropping this posts the sentinel to the collector.
    _owner: Owner,

    handle: Arc<TrackedHandle>,

    scheduler: Scheduler,
}

impl DirLock {
    /// Register `sentinel` for removal and wrap it in a lock object.
    ///
    /// If the scheduler is already shutting down the sentinel is removed at once.
    pub(super) fn new(sentinel: Sentinel, scheduler: &Scheduler) -> Result<Self> {
        let path = sentinel.path().to_path_buf();
        let owner = Owner::new();
        let handle = scheduler.register(&owner, move || sentinel.remove())?;
        Ok(Self {
            path,
            _owner: owner,
            handle,
            scheduler: scheduler.clone(),
        })
    }

    /// Get the path to the sentinel file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Release the lock now. Calling it again does nothing.
    pub fn free(&self) {
        self.scheduler.clear(&self.handle);
    }

    /// Whether the sentinel has been removed (or its removal attempted).
    pub fn is_freed(&self) -> bool {
        self.handle.is_cleaned()
    }

    /// The tracked handle behind this lock.
    pub fn handle(&self) -> &Arc<TrackedHandle> {
        &self.handle
    }
}
