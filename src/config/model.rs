//! Config struct definition and default implementation.

use super::types::*;
use serde::{Deserialize, Serialize};

/// Configuration for the lfs shim.
///
/// Unknown fields in the YAML are ignored for forward compatibility.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    // =========================================================================
    // Byte-range locking
    // =========================================================================
    /// Platform lock driver; `auto` detects the host.
    #[serde(default)]
    pub driver: DriverChoice,

    // =========================================================================
    // Directory locks
    // =========================================================================
    /// Sentinel creation strategy; `auto` picks the strongest available.
    #[serde(default)]
    pub dir_lock_strategy: DirLockStrategyChoice,

    /// File name of the sentinel created inside a locked directory.
    #[serde(default = "default_sentinel_name")]
    pub sentinel_name: String,

    /// Whether sentinels carry owner/pid/timestamp metadata where possible.
    #[serde(default = "default_true")]
    pub write_sentinel_metadata: bool,

    /// Minutes after which an orphaned sentinel counts as stale.
    #[serde(default = "default_stale_sentinel_minutes")]
    pub stale_sentinel_minutes: u32,

    // =========================================================================
    // Reclamation
    // =========================================================================
    /// Name of the background collector thread.
    #[serde(default = "default_collector_thread_name")]
    pub collector_thread_name: String,

    /// Whether the global scheduler drains its live-set at process exit.
    #[serde(default = "default_true")]
    pub drain_on_exit: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            driver: DriverChoice::default(),
            dir_lock_strategy: DirLockStrategyChoice::default(),
            sentinel_name: default_sentinel_name(),
            write_sentinel_metadata: default_true(),
            stale_sentinel_minutes: default_stale_sentinel_minutes(),
            collector_thread_name: default_collector_thread_name(),
            drain_on_exit: default_true(),
        }
    }
}
