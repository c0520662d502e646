//! Configuration enums and default value functions.

use serde::{Deserialize, Serialize};

/// Which platform lock driver to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DriverChoice {
    /// Detect the host driver once at startup (default).
    #[default]
    Auto,
    /// Record locks through `fcntl`.
    Posix,
    /// `LockFileEx` for handles, `_locking` for descriptors.
    Windows,
    /// Process-local range table plus whole-file advisory locks.
    Fallback,
}

impl DriverChoice {
    /// Parse a driver choice from a string.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "auto" => Some(Self::Auto),
            "posix" => Some(Self::Posix),
            "windows" => Some(Self::Windows),
            "fallback" => Some(Self::Fallback),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Posix => "posix",
            Self::Windows => "windows",
            Self::Fallback => "fallback",
        }
    }
}

/// How directory sentinels are created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DirLockStrategyChoice {
    /// Strongest primitive the platform offers (default).
    #[default]
    Auto,
    /// Write a private temp file, then hard-link it to the sentinel name.
    HardLink,
    /// Native exclusive create with no sharing and delete-on-close.
    CreateExclusive,
    /// Plain `create_new` open.
    CreateNew,
}

impl DirLockStrategyChoice {
    /// Parse a strategy choice from a string.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "auto" => Some(Self::Auto),
            "hard_link" => Some(Self::HardLink),
            "create_exclusive" => Some(Self::CreateExclusive),
            "create_new" => Some(Self::CreateNew),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::HardLink => "hard_link",
            Self::CreateExclusive => "create_exclusive",
            Self::CreateNew => "create_new",
        }
    }
}

// Default value functions for serde
pub(crate) fn default_sentinel_name() -> String {
    "lockfile.lfs".to_string()
}
pub(crate) fn default_collector_thread_name() -> String {
    "lfs-reclaim".to_string()
}
pub(crate) fn default_stale_sentinel_minutes() -> u32 {
    120
}
pub(crate) fn default_true() -> bool {
    true
}
