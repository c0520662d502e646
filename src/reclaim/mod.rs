//! Deferred resource reclamation.
//!
//! Scripts never call destructors, so every native resource handed to a script
//! (a byte-range lock, a directory sentinel) is wrapped in a [`TrackedHandle`]
//! and registered with a [`Scheduler`]. The handle's cleanup runs exactly once,
//! whichever of these happens first:
//!
//! - an explicit release (`unlock`, `free`) calls [`Scheduler::clear`];
//! - the script-visible object is dropped, its [`Owner`] posts an
//!   unreachability notification, and the background collector clears it;
//! - the process exits and [`Scheduler::shutdown`] drains the live-set.
//!
//! "Exactly once" is enforced by removal from the live-set, which is atomic.
//! Cleanup callbacks run with no scheduler lock held and their failures are
//! logged and discarded.

mod handle;
mod scheduler;

#[cfg(test)]
mod tests;

pub use handle::{HandleId, Owner, TrackedHandle};
pub use scheduler::Scheduler;

use std::sync::{Mutex, MutexGuard};

/// Lock a mutex, recovering the data if a panicking thread poisoned it.
pub(crate) fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poison| poison.into_inner())
}
