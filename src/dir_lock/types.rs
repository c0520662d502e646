//! Sentinel strategies and inspection results.

use super::metadata::SentinelMetadata;
use crate::config::DirLockStrategyChoice;
use crate::error::{LfsError, Result};
use chrono::{DateTime, Duration, Utc};
use std::path::PathBuf;

/// Primitive used to create a sentinel atomically.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirLockStrategy {
    /// Write a private temp file, then `link()` it to the sentinel name.
    HardLink,
    /// `CREATE_NEW` with no sharing and delete-on-close; the handle stays open.
    CreateExclusive,
    /// Plain exclusive create.
    CreateNew,
}

impl DirLockStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            DirLockStrategy::HardLink => "hard_link",
            DirLockStrategy::CreateExclusive => "create_exclusive",
            DirLockStrategy::CreateNew => "create_new",
        }
    }

    /// Strongest strategy the platform offers.
    pub fn strongest() -> Self {
        if cfg!(windows) {
            DirLockStrategy::CreateExclusive
        } else if cfg!(unix) {
            DirLockStrategy::HardLink
        } else {
            DirLockStrategy::CreateNew
        }
    }

    /// Resolve a configured choice against what the platform supports.
    pub fn resolve(choice: DirLockStrategyChoice) -> Result<Self> {
        match choice {
            DirLockStrategyChoice::Auto => Ok(Self::strongest()),
            DirLockStrategyChoice::HardLink => Ok(DirLockStrategy::HardLink),
            DirLockStrategyChoice::CreateExclusive if cfg!(windows) => {
                Ok(DirLockStrategy::CreateExclusive)
            }
            DirLockStrategyChoice::CreateExclusive => Err(LfsError::Config(
                "dir_lock_strategy 'create_exclusive' is only available on Windows".to_string(),
            )),
            DirLockStrategyChoice::CreateNew => Ok(DirLockStrategy::CreateNew),
        }
    }
}

/// What is known about a sentinel found on disk.
#[derive(Debug, Clone)]
pub struct SentinelInfo {
    /// The sentinel path.
    pub path: PathBuf,

    /// Parsed metadata, if the sentinel carries readable metadata.
    pub metadata: Option<SentinelMetadata>,

    /// Creation time from metadata, else the file's modification time.
    pub created_at: Option<DateTime<Utc>>,

    /// Whether the sentinel is older than the configured threshold.
    pub is_stale: bool,
}

impl SentinelInfo {
    /// Combine what was read from disk. `modified` stands in for the creation
    /// time when the sentinel carries no metadata.
    pub(crate) fn new(
        path: PathBuf,
        metadata: Option<SentinelMetadata>,
        modified: Option<DateTime<Utc>>,
        stale_after_minutes: u32,
    ) -> Self {
        let created_at = metadata.as_ref().map(|m| m.created_at).or(modified);
        let is_stale = created_at.is_some_and(|created_at| {
            Utc::now().signed_duration_since(created_at).num_minutes()
                > i64::from(stale_after_minutes)
        });
        Self {
            path,
            metadata,
            created_at,
            is_stale,
        }
    }

    pub fn age(&self) -> Option<Duration> {
        self.created_at
            .map(|created_at| Utc::now().signed_duration_since(created_at))
    }

    pub fn age_string(&self) -> String {
        self.age()
            .map(describe_age)
            .unwrap_or_else(|| "unknown".to_string())
    }
}

/// Coarse age: `3d 4h`, `2h 15m` or `42m`.
pub(crate) fn describe_age(age: Duration) -> String {
    let minutes = age.num_minutes().max(0);
    let (days, hours, mins) = (minutes / 1440, minutes / 60 % 24, minutes % 60);
    match (days, hours) {
        (0, 0) => format!("{mins}m"),
        (0, _) => format!("{hours}h {mins}m"),
        _ => format!("{days}d {hours}h"),
    }
}

impl std::fmt::Display for SentinelInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let owner = self
            .metadata
            .as_ref()
            .map(|m| m.owner.as_str())
            .unwrap_or("unknown");
        write!(
            f,
            "{} (owner: {}, age: {}{})",
            self.path.display(),
            owner,
            self.age_string(),
            if self.is_stale { ", STALE" } else { "" }
        )?;
        if let Some(pid) = self.metadata.as_ref().and_then(|m| m.pid) {
            write!(f, " pid {}", pid)?;
        }
        Ok(())
    }
}
