//! Tests for the reclamation scheduler.

use super::*;
use crate::error::LfsError;
use crate::test_support::{counting_cleanup, failing_cleanup, scratch_scheduler, wait_until};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

#[test]
fn test_register_adds_to_live_set() {
    let scheduler = scratch_scheduler();
    let owner = Owner::new();
    let count = Arc::new(AtomicUsize::new(0));

    let handle = scheduler.register(&owner, counting_cleanup(&count)).unwrap();

    assert!(scheduler.is_live(&handle));
    assert!(!handle.is_cleaned());
    assert!(handle.owner_reachable());
    assert_eq!(scheduler.live_count(), 1);
    assert_eq!(count.load(Ordering::SeqCst), 0);

    scheduler.shutdown();
}

#[test]
fn test_double_clear_runs_cleanup_once() {
    let scheduler = scratch_scheduler();
    let owner = Owner::new();
    let count = Arc::new(AtomicUsize::new(0));
    let handle = scheduler.register(&owner, counting_cleanup(&count)).unwrap();

    assert!(scheduler.clear(&handle));
    assert!(!scheduler.clear(&handle));

    assert_eq!(count.load(Ordering::SeqCst), 1);
    assert!(handle.is_cleaned());
    assert!(!scheduler.is_live(&handle));
    assert_eq!(scheduler.live_count(), 0);

    scheduler.shutdown();
}

#[test]
fn test_clear_after_drop_notification_is_noop() {
    let scheduler = scratch_scheduler();
    let count = Arc::new(AtomicUsize::new(0));
    let owner = Owner::new();
    let handle = scheduler.register(&owner, counting_cleanup(&count)).unwrap();

    drop(owner);
    scheduler.flush();
    assert!(!handle.owner_reachable());
    assert!(handle.is_cleaned());

    assert!(!scheduler.clear(&handle));
    assert_eq!(count.load(Ordering::SeqCst), 1);

    scheduler.shutdown();
}

#[test]
fn test_dropping_owner_reclaims_in_background() {
    let scheduler = scratch_scheduler();
    let count = Arc::new(AtomicUsize::new(0));
    let owner = Owner::new();
    let first = scheduler.register(&owner, counting_cleanup(&count)).unwrap();
    let second = scheduler.register(&owner, counting_cleanup(&count)).unwrap();

    drop(owner);

    assert!(wait_until(Duration::from_secs(5), || {
        scheduler.live_count() == 0
    }));
    assert!(first.is_cleaned());
    assert!(second.is_cleaned());
    assert_eq!(count.load(Ordering::SeqCst), 2);

    scheduler.shutdown();
}

#[test]
fn test_flush_is_a_collection_barrier() {
    let scheduler = scratch_scheduler();
    let count = Arc::new(AtomicUsize::new(0));

    for _ in 0..16 {
        let owner = Owner::new();
        scheduler.register(&owner, counting_cleanup(&count)).unwrap();
    }
    scheduler.flush();

    assert_eq!(count.load(Ordering::SeqCst), 16);
    assert_eq!(scheduler.live_count(), 0);

    scheduler.shutdown();
}

#[test]
fn test_failing_cleanup_is_swallowed_and_marked_cleaned() {
    let scheduler = scratch_scheduler();
    let owner = Owner::new();
    let count = Arc::new(AtomicUsize::new(0));
    let handle = scheduler.register(&owner, failing_cleanup(&count)).unwrap();

    assert!(scheduler.clear(&handle));
    assert!(handle.is_cleaned());
    assert!(!scheduler.clear(&handle));
    assert_eq!(count.load(Ordering::SeqCst), 1);

    scheduler.shutdown();
}

#[test]
fn test_panicking_cleanup_does_not_kill_collector() {
    let scheduler = scratch_scheduler();
    let count = Arc::new(AtomicUsize::new(0));

    let doomed = Owner::new();
    let panicky = scheduler
        .register(&doomed, || -> crate::error::Result<()> { panic!("boom") })
        .unwrap();
    drop(doomed);
    scheduler.flush();
    assert!(panicky.is_cleaned());

    // The collector must still be serving notifications.
    let owner = Owner::new();
    let handle = scheduler.register(&owner, counting_cleanup(&count)).unwrap();
    drop(owner);
    scheduler.flush();
    assert!(handle.is_cleaned());
    assert_eq!(count.load(Ordering::SeqCst), 1);

    scheduler.shutdown();
}

#[test]
fn test_concurrent_clear_runs_cleanup_once() {
    let scheduler = scratch_scheduler();
    let count = Arc::new(AtomicUsize::new(0));

    for _ in 0..32 {
        let owner = Owner::new();
        let handle = scheduler.register(&owner, counting_cleanup(&count)).unwrap();

        let racers: Vec<_> = (0..4)
            .map(|_| {
                let scheduler = scheduler.clone();
                let handle = Arc::clone(&handle);
                thread::spawn(move || scheduler.clear(&handle))
            })
            .collect();
        // Race the collector too.
        drop(owner);

        let winners = racers
            .into_iter()
            .map(|t| t.join().unwrap())
            .filter(|won| *won)
            .count();
        assert!(winners <= 1);
    }

    scheduler.flush();
    assert_eq!(count.load(Ordering::SeqCst), 32);
    assert_eq!(scheduler.live_count(), 0);

    scheduler.shutdown();
}

#[test]
fn test_shutdown_drains_every_live_handle() {
    let scheduler = scratch_scheduler();
    let count = Arc::new(AtomicUsize::new(0));
    let owners: Vec<Owner> = (0..10).map(|_| Owner::new()).collect();
    let handles: Vec<_> = owners
        .iter()
        .map(|owner| scheduler.register(owner, counting_cleanup(&count)).unwrap())
        .collect();

    let drained = scheduler.shutdown();

    assert_eq!(drained, 10);
    assert_eq!(scheduler.live_count(), 0);
    assert!(handles.iter().all(|h| h.is_cleaned()));
    assert_eq!(count.load(Ordering::SeqCst), 10);

    // Owners dropped after shutdown must not run anything twice.
    drop(owners);
    assert_eq!(count.load(Ordering::SeqCst), 10);
}

#[test]
fn test_shutdown_after_partial_collection() {
    let scheduler = scratch_scheduler();
    let count = Arc::new(AtomicUsize::new(0));

    let collected: Vec<Owner> = (0..3).map(|_| Owner::new()).collect();
    for owner in &collected {
        scheduler.register(owner, counting_cleanup(&count)).unwrap();
    }
    let kept: Vec<Owner> = (0..4).map(|_| Owner::new()).collect();
    for owner in &kept {
        scheduler.register(owner, counting_cleanup(&count)).unwrap();
    }

    drop(collected);
    scheduler.flush();
    assert_eq!(scheduler.live_count(), 4);

    assert_eq!(scheduler.shutdown(), 4);
    assert_eq!(scheduler.live_count(), 0);
    assert_eq!(count.load(Ordering::SeqCst), 7);
}

#[test]
fn test_register_after_shutdown_fails_fast() {
    let scheduler = scratch_scheduler();
    scheduler.shutdown();
    assert!(scheduler.is_shutting_down());

    let owner = Owner::new();
    let count = Arc::new(AtomicUsize::new(0));
    let result = scheduler.register(&owner, counting_cleanup(&count));

    assert!(matches!(result, Err(LfsError::ShuttingDown)));
    // The refused resource is still released.
    assert_eq!(count.load(Ordering::SeqCst), 1);
    assert_eq!(scheduler.live_count(), 0);
}

#[test]
fn test_drop_after_shutdown_reclaims_inline() {
    let scheduler = scratch_scheduler();
    let owner = Owner::new();
    let count = Arc::new(AtomicUsize::new(0));
    let handle = scheduler.register(&owner, counting_cleanup(&count)).unwrap();

    scheduler.shutdown();
    drop(owner);

    assert!(handle.is_cleaned());
    assert_eq!(count.load(Ordering::SeqCst), 1);
}

#[test]
#[serial_test::serial]
fn test_global_is_started_once() {
    let first = Scheduler::global();
    let second = Scheduler::init_global(&crate::config::Config::default());

    assert!(std::ptr::eq(first, second));
    assert!(Scheduler::try_global().is_some_and(|s| std::ptr::eq(s, first)));
    assert!(!first.is_shutting_down());

    let owner = Owner::new();
    let count = Arc::new(AtomicUsize::new(0));
    let handle = first.register(&owner, counting_cleanup(&count)).unwrap();
    drop(owner);
    first.flush();

    assert!(handle.is_cleaned());
    assert_eq!(count.load(Ordering::SeqCst), 1);
}

#[test]
fn test_unusable_thread_name_still_collects() {
    let config = crate::config::Config {
        collector_thread_name: "lfs\0reclaim".to_string(),
        drain_on_exit: false,
        ..crate::config::Config::default()
    };
    let scheduler = Scheduler::start(&config);
    let owner = Owner::new();
    let count = Arc::new(AtomicUsize::new(0));
    let handle = scheduler.register(&owner, counting_cleanup(&count)).unwrap();

    drop(owner);
    scheduler.flush();

    assert!(handle.is_cleaned());
    assert_eq!(count.load(Ordering::SeqCst), 1);
}
