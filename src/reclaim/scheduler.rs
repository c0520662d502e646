//! The process-wide reclamation scheduler and its collector thread.

use super::handle::{Cleanup, HandleId, Owner, TrackedHandle};
use super::lock_unpoisoned;
use crate::config::Config;
use crate::error::{LfsError, Result};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, OnceLock, Weak};
use std::thread::{self, JoinHandle};
use tracing::{debug, info, warn};

static GLOBAL: OnceLock<Scheduler> = OnceLock::new();

enum Notice {
    /// The owner of this handle was dropped.
    Unreachable(HandleId),
    /// Acknowledge once every earlier notice has been handled.
    Barrier(Sender<()>),
}

pub(crate) struct Shared {
    live: Mutex<HashMap<HandleId, Arc<TrackedHandle>>>,
    queue: Mutex<Option<Sender<Notice>>>,
    collector: Mutex<Option<JoinHandle<()>>>,
    shutting_down: AtomicBool,
    next_id: AtomicU64,
}

impl Shared {
    /// Post an unreachability notice, or reclaim inline when no collector runs.
    pub(crate) fn notify(&self, id: HandleId) {
        let sent = match &*lock_unpoisoned(&self.queue) {
            Some(queue) => queue.send(Notice::Unreachable(id)).is_ok(),
            None => false,
        };
        if !sent {
            self.reclaim(id);
        }
    }

    /// Remove `id` from the live-set and, if this call removed it, run its cleanup.
    fn reclaim(&self, id: HandleId) -> bool {
        let handle = lock_unpoisoned(&self.live).remove(&id);
        match handle {
            Some(handle) => handle.run_cleanup(),
            None => false,
        }
    }
}

/// Handle to a reclamation scheduler. Clones share the same live-set.
#[derive(Clone)]
pub struct Scheduler {
    shared: Arc<Shared>,
}

impl Scheduler {
    /// Start a scheduler with its own collector thread.
    ///
    /// If the thread cannot be spawned, notifications are reclaimed inline on
    /// the thread that drops the owner. The collector stops when the last clone
    /// is dropped; handles still live at that point are only cleaned by an
    /// explicit [`Scheduler::shutdown`].
    pub fn start(config: &Config) -> Self {
        let (sender, receiver) = mpsc::channel();
        let shared = Arc::new(Shared {
            live: Mutex::new(HashMap::new()),
            queue: Mutex::new(Some(sender)),
            collector: Mutex::new(None),
            shutting_down: AtomicBool::new(false),
            next_id: AtomicU64::new(1),
        });

        // `Builder::name` panics on interior NUL, so such names go unnamed.
        let mut builder = thread::Builder::new();
        if !config.collector_thread_name.contains('\0') {
            builder = builder.name(config.collector_thread_name.clone());
        }
        let worker = Arc::downgrade(&shared);
        let spawned = builder.spawn(move || collect(worker, receiver));

        match spawned {
            Ok(join) => *lock_unpoisoned(&shared.collector) = Some(join),
            Err(e) => {
                warn!(error = %e, "failed to spawn collector thread, reclaiming inline");
                lock_unpoisoned(&shared.queue).take();
            }
        }

        Self { shared }
    }

    /// The process-wide scheduler, started with default configuration on first use.
    pub fn global() -> &'static Scheduler {
        Self::init_global(&Config::default())
    }

    /// The process-wide scheduler, started with `config` if it is not running yet.
    pub fn init_global(config: &Config) -> &'static Scheduler {
        GLOBAL.get_or_init(|| {
            let scheduler = Scheduler::start(config);
            if config.drain_on_exit {
                install_exit_hook();
            }
            scheduler
        })
    }

    /// The process-wide scheduler, if anything has started it.
    pub fn try_global() -> Option<&'static Scheduler> {
        GLOBAL.get()
    }

    /// Track a resource owned by `owner`.
    ///
    /// Once shutdown has begun this fails with `ShuttingDown`; the cleanup is
    /// run immediately so the resource does not outlive the refusal.
    pub fn register<F>(&self, owner: &Owner, cleanup: F) -> Result<Arc<TrackedHandle>>
    where
        F: FnOnce() -> Result<()> + Send + 'static,
    {
        let id = self.shared.next_id.fetch_add(1, Ordering::Relaxed);
        let cleanup: Cleanup = Box::new(cleanup);
        let handle = Arc::new(TrackedHandle::new(id, owner.downgrade(), cleanup));

        {
            let mut live = lock_unpoisoned(&self.shared.live);
            if self.shared.shutting_down.load(Ordering::Acquire) {
                drop(live);
                handle.run_cleanup();
                return Err(LfsError::ShuttingDown);
            }
            live.insert(id, Arc::clone(&handle));
        }

        owner.watch(Arc::downgrade(&self.shared), &handle);
        debug!(handle = id, "registered");
        Ok(handle)
    }

    /// Release a handle now. Idempotent; returns whether this call ran the cleanup.
    pub fn clear(&self, handle: &TrackedHandle) -> bool {
        self.shared.reclaim(handle.id())
    }

    /// Block until the collector has handled every notice posted before this call.
    pub fn flush(&self) {
        let (ack, done) = mpsc::channel();
        let sent = match &*lock_unpoisoned(&self.shared.queue) {
            Some(queue) => queue.send(Notice::Barrier(ack)).is_ok(),
            None => false,
        };
        if sent {
            let _ = done.recv();
        }
    }

    /// Stop the collector and synchronously clean every handle still live.
    ///
    /// Returns the number of handles drained here, not counting those the
    /// collector finished while stopping.
    pub fn shutdown(&self) -> usize {
        {
            let _live = lock_unpoisoned(&self.shared.live);
            self.shared.shutting_down.store(true, Ordering::Release);
        }

        // Closing the queue lets the collector finish what is already queued.
        lock_unpoisoned(&self.shared.queue).take();
        let collector = lock_unpoisoned(&self.shared.collector).take();
        if let Some(join) = collector {
            if join.thread().id() == thread::current().id() {
                debug!("shutdown called from the collector, not joining");
            } else if join.join().is_err() {
                warn!("collector thread panicked");
            }
        }

        let remaining: Vec<Arc<TrackedHandle>> = lock_unpoisoned(&self.shared.live)
            .drain()
            .map(|(_, handle)| handle)
            .collect();
        let drained = remaining.len();
        for handle in remaining {
            handle.run_cleanup();
        }

        info!(drained, "reclamation scheduler shut down");
        drained
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shared.shutting_down.load(Ordering::Acquire)
    }

    /// Number of handles not yet cleaned.
    pub fn live_count(&self) -> usize {
        lock_unpoisoned(&self.shared.live).len()
    }

    pub fn is_live(&self, handle: &TrackedHandle) -> bool {
        lock_unpoisoned(&self.shared.live).contains_key(&handle.id())
    }

    /// Whether both values drive the same collector.
    pub fn ptr_eq(&self, other: &Scheduler) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("live", &self.live_count())
            .field("shutting_down", &self.is_shutting_down())
            .finish()
    }
}

/// Runs until the queue closes: at `shutdown`, or once every `Scheduler` clone
/// is gone and `Shared` (which owns the sender) is dropped.
fn collect(shared: Weak<Shared>, queue: Receiver<Notice>) {
    debug!("collector started");
    while let Ok(notice) = queue.recv() {
        match notice {
            Notice::Unreachable(id) => {
                let Some(shared) = shared.upgrade() else {
                    break;
                };
                shared.reclaim(id);
            }
            Notice::Barrier(ack) => {
                let _ = ack.send(());
            }
        }
    }
    debug!("collector stopped");
}

#[cfg(unix)]
fn install_exit_hook() {
    extern "C" fn drain_at_exit() {
        if let Some(scheduler) = GLOBAL.get() {
            scheduler.shutdown();
        }
    }

    // SAFETY: registers a plain function with no captured state.
    if unsafe { libc::atexit(drain_at_exit) } != 0 {
        warn!("failed to install process-exit drain hook");
    }
}

#[cfg(not(unix))]
fn install_exit_hook() {
    debug!("no process-exit hook on this platform, embedder must call Scheduler::shutdown");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collector_exits_when_last_clone_drops() {
        let config = Config {
            collector_thread_name: "lfs-reclaim-exit".to_string(),
            drain_on_exit: false,
            ..Config::default()
        };
        let scheduler = Scheduler::start(&config);
        let clone = scheduler.clone();
        let weak = Arc::downgrade(&scheduler.shared);
        let join = lock_unpoisoned(&scheduler.shared.collector)
            .take()
            .unwrap();

        drop(scheduler);
        assert!(weak.upgrade().is_some());
        drop(clone);

        join.join().unwrap();
        assert!(weak.upgrade().is_none());
    }
}
