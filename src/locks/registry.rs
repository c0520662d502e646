//! The lock registry: at most one live lock per (file, range).

use super::driver::LockDriver;
use super::types::{LockKey, LockMode, LockRange, PlatformLock};
use crate::error::Result;
use crate::file::{FileHandle, WeakFileHandle};
use crate::reclaim::{Scheduler, TrackedHandle, lock_unpoisoned};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};
use tracing::debug;

type Entries = Mutex<HashMap<LockKey, LockEntry>>;

struct LockEntry {
    serial: u64,
    mode: LockMode,
    handle: Arc<TrackedHandle>,
}

/// Tracks every byte-range lock this process holds through the active driver.
///
/// Each lock is registered with the [`Scheduler`] against its file's owner, so a
/// lock is released by `unlock`, by a later lock on the identical key, by the
/// file being dropped, or by the exit drain, whichever comes first.
///
/// Re-locking an identical key replaces the previous entry instead of failing.
/// This is bookkeeping within one process, not mutual exclusion: other
/// processes only ever see the driver's advisory locks.
pub struct LockRegistry {
    driver: Arc<dyn LockDriver>,
    scheduler: Scheduler,
    entries: Arc<Entries>,
    next_serial: AtomicU64,
}

impl LockRegistry {
    pub fn new(driver: Arc<dyn LockDriver>, scheduler: Scheduler) -> Self {
        Self {
            driver,
            scheduler,
            entries: Arc::new(Mutex::new(HashMap::new())),
            next_serial: AtomicU64::new(1),
        }
    }

    pub fn driver(&self) -> &dyn LockDriver {
        self.driver.as_ref()
    }

    pub fn lock_shared(&self, file: &FileHandle, range: LockRange) -> Result<()> {
        self.lock(file, LockMode::Shared, range)
    }

    pub fn lock_exclusive(&self, file: &FileHandle, range: LockRange) -> Result<()> {
        self.lock(file, LockMode::Exclusive, range)
    }

    /// Take `mode` over `range`, first evicting any entry on the identical key.
    ///
    /// On failure nothing is registered, though an evicted entry stays released.
    pub fn lock(&self, file: &FileHandle, mode: LockMode, range: LockRange) -> Result<()> {
        let key = LockKey::new(file, range);

        let previous = lock_unpoisoned(&self.entries).remove(&key);
        if let Some(previous) = previous {
            debug!(file = key.file, start = range.start, len = range.len, "evicting previous holder");
            self.scheduler.clear(&previous.handle);
        }

        let lock = self.driver.acquire(file, mode, range)?;
        let serial = self.next_serial.fetch_add(1, Ordering::Relaxed);
        let cleanup = release_on_clear(
            Arc::downgrade(&self.entries),
            Arc::clone(&self.driver),
            file.downgrade(),
            serial,
            lock,
        );
        let handle = self.scheduler.register(file.owner(), cleanup)?;

        let raced = lock_unpoisoned(&self.entries).insert(
            key,
            LockEntry {
                serial,
                mode,
                handle,
            },
        );
        if let Some(raced) = raced {
            self.scheduler.clear(&raced.handle);
        }
        debug!(file = key.file, mode = mode.as_str(), start = range.start, len = range.len, "lock registered");
        Ok(())
    }

    /// Release the lock on exactly this key, or report that none is held.
    pub fn unlock(&self, file: &FileHandle, range: LockRange) -> Result<()> {
        let key = LockKey::new(file, range);
        let entry = lock_unpoisoned(&self.entries).remove(&key);
        match entry {
            Some(entry) => {
                self.scheduler.clear(&entry.handle);
                debug!(file = key.file, start = range.start, len = range.len, "lock released");
                Ok(())
            }
            None => Err(self.driver.not_held()),
        }
    }

    pub fn is_held(&self, file: &FileHandle, range: LockRange) -> bool {
        lock_unpoisoned(&self.entries).contains_key(&LockKey::new(file, range))
    }

    /// Mode of the lock registered on exactly this key.
    pub fn mode_of(&self, file: &FileHandle, range: LockRange) -> Option<LockMode> {
        lock_unpoisoned(&self.entries)
            .get(&LockKey::new(file, range))
            .map(|entry| entry.mode)
    }

    pub fn len(&self) -> usize {
        lock_unpoisoned(&self.entries).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for LockRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LockRegistry")
            .field("driver", &self.driver.name())
            .field("entries", &self.len())
            .finish()
    }
}

/// Cleanup for one registered lock.
///
/// It drops the registry entry if that entry is still this lock, then releases
/// the OS lock. Only weak references are held, so a registered lock keeps
/// neither its file nor the registry alive.
fn release_on_clear(
    entries: Weak<Entries>,
    driver: Arc<dyn LockDriver>,
    file: WeakFileHandle,
    serial: u64,
    lock: PlatformLock,
) -> impl FnOnce() -> Result<()> + Send + 'static {
    move || {
        if let Some(entries) = entries.upgrade() {
            let mut entries = lock_unpoisoned(&entries);
            let key = lock.key();
            if entries.get(&key).is_some_and(|e| e.serial == serial) {
                entries.remove(&key);
            }
        }

        match file.upgrade() {
            Some(file) => driver.release(&file, &lock),
            None => {
                driver.forget(&lock);
                Ok(())
            }
        }
    }
}
