//! The holder record a sentinel carries.

use super::types::DirLockStrategy;
use crate::error::{LfsError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Who created a sentinel, and how.
///
/// Sentinels are only a presence marker; this record is informational and may
/// be missing, e.g. for delete-on-close sentinels or ones made by other tools.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentinelMetadata {
    /// `user@host` of the creating process.
    pub owner: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,

    pub created_at: DateTime<Utc>,

    /// [`DirLockStrategy::as_str`] of the primitive that created the sentinel.
    pub strategy: String,
}

impl SentinelMetadata {
    /// This process, creating a sentinel with `strategy` now.
    pub fn current(strategy: DirLockStrategy) -> Self {
        Self {
            owner: holder_label(),
            pid: Some(std::process::id()),
            created_at: Utc::now(),
            strategy: strategy.as_str().to_string(),
        }
    }

    /// The record stored in the sentinel at `path`, if it holds a readable one.
    pub fn read(path: &Path) -> Option<Self> {
        let bytes = std::fs::read(path).ok()?;
        serde_json::from_slice(&bytes).ok()
    }

    /// JSON body written into a new sentinel.
    pub fn encode(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| LfsError::Io {
            message: format!("cannot encode sentinel record: {}", e),
            code: None,
        })
    }
}

fn holder_label() -> String {
    let user = ["USER", "USERNAME"]
        .iter()
        .find_map(|var| std::env::var(var).ok())
        .unwrap_or_else(|| "unknown".to_string());
    let host = hostname::get()
        .ok()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "unknown".to_string());
    format!("{user}@{host}")
}
