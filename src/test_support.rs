use crate::config::Config;
use crate::error::{LfsError, Result};
use crate::reclaim::Scheduler;
use std::fs::{File, OpenOptions};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

/// Poll `check` until it holds or `timeout` elapses. Returns the final result.
pub(crate) fn wait_until(timeout: Duration, mut check: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        if check() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
}

/// A private scheduler so tests never share the process-wide live-set.
pub(crate) fn scratch_scheduler() -> Scheduler {
    let config = Config {
        collector_thread_name: "lfs-reclaim-test".to_string(),
        drain_on_exit: false,
        ..Config::default()
    };
    Scheduler::start(&config)
}

/// A cleanup that bumps `counter` each time it runs.
pub(crate) fn counting_cleanup(
    counter: &Arc<AtomicUsize>,
) -> impl FnOnce() -> Result<()> + Send + 'static {
    let counter = Arc::clone(counter);
    move || {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// A cleanup that always fails after bumping `counter`.
pub(crate) fn failing_cleanup(
    counter: &Arc<AtomicUsize>,
) -> impl FnOnce() -> Result<()> + Send + 'static {
    let counter = Arc::clone(counter);
    move || {
        counter.fetch_add(1, Ordering::SeqCst);
        Err(LfsError::Fault("cleanup exploded".to_string()))
    }
}

/// Create (or reuse) `path` and open it read-write, sized to `len` bytes.
pub(crate) fn open_rw(path: &Path, len: u64) -> File {
    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)
        .unwrap();
    file.set_len(len).unwrap();
    file
}
