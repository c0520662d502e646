//! Config loading, validation, and utility operations.

use super::model::Config;
use crate::error::{LfsError, Result};
use std::path::{Component, Path};

impl Config {
    /// Load config from a YAML file.
    ///
    /// Unknown fields in the YAML are silently ignored for forward compatibility.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path).map_err(|e| {
            LfsError::Config(format!(
                "failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;

        Self::from_yaml(&content)
    }

    /// Parse config from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        // An empty document deserializes to unit, not to a mapping.
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }

        let config: Config = serde_yaml::from_str(yaml)
            .map_err(|e| LfsError::Config(format!("failed to parse config YAML: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Serialize config to YAML string.
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self)
            .map_err(|e| LfsError::Config(format!("failed to serialize config to YAML: {}", e)))
    }

    /// Validate config values.
    ///
    /// Validation rules:
    /// - `sentinel_name` must be a single normal path component
    /// - `stale_sentinel_minutes` must be positive
    /// - `collector_thread_name` must be non-empty and free of NUL bytes
    pub fn validate(&self) -> Result<()> {
        let mut components = Path::new(&self.sentinel_name).components();
        let single_normal = matches!(
            (components.next(), components.next()),
            (Some(Component::Normal(_)), None)
        );
        if !single_normal {
            return Err(LfsError::Config(format!(
                "config validation failed: sentinel_name must be a plain file name (found '{}')",
                self.sentinel_name
            )));
        }

        if self.stale_sentinel_minutes == 0 {
            return Err(LfsError::Config(
                "config validation failed: stale_sentinel_minutes must be greater than 0"
                    .to_string(),
            ));
        }

        if self.collector_thread_name.trim().is_empty() {
            return Err(LfsError::Config(
                "config validation failed: collector_thread_name must be non-empty".to_string(),
            ));
        }

        if self.collector_thread_name.contains('\0') {
            return Err(LfsError::Config(
                "config validation failed: collector_thread_name must not contain NUL bytes"
                    .to_string(),
            ));
        }

        Ok(())
    }
}
