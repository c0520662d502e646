//! Tracked handles and the owners whose reachability they follow.

use super::lock_unpoisoned;
use super::scheduler::Shared;
use crate::error::Result;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};
use tracing::{debug, warn};

/// Identifier of a tracked handle, unique within its scheduler.
pub type HandleId = u64;

pub(crate) type Cleanup = Box<dyn FnOnce() -> Result<()> + Send>;

/// A registered resource and its one-shot cleanup.
pub struct TrackedHandle {
    id: HandleId,
    owner: Weak<OwnerInner>,
    cleanup: Mutex<Option<Cleanup>>,
    cleaned: AtomicBool,
}

impl TrackedHandle {
    pub(crate) fn new(id: HandleId, owner: Weak<OwnerInner>, cleanup: Cleanup) -> Self {
        Self {
            id,
            owner,
            cleanup: Mutex::new(Some(cleanup)),
            cleaned: AtomicBool::new(false),
        }
    }

    pub fn id(&self) -> HandleId {
        self.id
    }

    /// Whether the cleanup has run (successfully or not).
    pub fn is_cleaned(&self) -> bool {
        self.cleaned.load(Ordering::Acquire)
    }

    /// Whether the script-visible owner is still alive.
    pub fn owner_reachable(&self) -> bool {
        self.owner.strong_count() > 0
    }

    /// Run the cleanup if it has not run yet.
    ///
    /// Errors and panics from the callback are logged and swallowed; the handle
    /// is marked cleaned either way. Returns whether this call ran the callback.
    pub(crate) fn run_cleanup(&self) -> bool {
        let cleanup = lock_unpoisoned(&self.cleanup).take();
        let Some(cleanup) = cleanup else {
            return false;
        };

        match panic::catch_unwind(AssertUnwindSafe(cleanup)) {
            Ok(Ok(())) => debug!(handle = self.id, "resource reclaimed"),
            Ok(Err(e)) => warn!(handle = self.id, error = %e, "cleanup failed, discarding"),
            Err(_) => warn!(handle = self.id, "cleanup panicked, discarding"),
        }

        self.cleaned.store(true, Ordering::Release);
        true
    }
}

impl fmt::Debug for TrackedHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrackedHandle")
            .field("id", &self.id)
            .field("cleaned", &self.is_cleaned())
            .field("owner_reachable", &self.owner_reachable())
            .finish()
    }
}

/// Reachability token for a script-visible object.
///
/// Embed one in every object handed to a script. When it is dropped, each
/// handle registered against it is posted to its scheduler's collector.
pub struct Owner {
    inner: Arc<OwnerInner>,
}

pub(crate) struct OwnerInner {
    watchers: Mutex<Vec<Watcher>>,
}

struct Watcher {
    scheduler: Weak<Shared>,
    handle: Weak<TrackedHandle>,
}

impl Owner {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(OwnerInner {
                watchers: Mutex::new(Vec::new()),
            }),
        }
    }

    pub(crate) fn downgrade(&self) -> Weak<OwnerInner> {
        Arc::downgrade(&self.inner)
    }

    pub(crate) fn watch(&self, scheduler: Weak<Shared>, handle: &Arc<TrackedHandle>) {
        let mut watchers = lock_unpoisoned(&self.inner.watchers);
        // Handles already cleaned and released by everyone are dead weight.
        watchers.retain(|w| w.handle.strong_count() > 0);
        watchers.push(Watcher {
            scheduler,
            handle: Arc::downgrade(handle),
        });
    }
}

impl Default for Owner {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Owner {
    fn drop(&mut self) {
        let watchers = std::mem::take(&mut *lock_unpoisoned(&self.inner.watchers));
        for watcher in watchers {
            if let (Some(shared), Some(handle)) =
                (watcher.scheduler.upgrade(), watcher.handle.upgrade())
            {
                shared.notify(handle.id());
            }
        }
    }
}

impl fmt::Debug for Owner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let watched = lock_unpoisoned(&self.inner.watchers).len();
        f.debug_struct("Owner").field("watched", &watched).finish()
    }
}
