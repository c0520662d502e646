//! Configuration model for lfs-shim.
//!
//! This module defines the Config struct an embedder loads from YAML (or takes
//! as defaults). It supports forward-compatible parsing (unknown fields are
//! ignored), sensible defaults for every field, and validation of values.

mod model;
mod operations;
pub mod types;

#[cfg(test)]
mod tests;

// Re-export public API
pub use model::Config;
pub use types::{DirLockStrategyChoice, DriverChoice};
