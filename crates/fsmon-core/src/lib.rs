//! Core configuration types and utilities for the fsmon tool.
//!
//! This crate provides the foundational types used across the workspace:
//!
//! - [`MonitorConfig`] - validated engine configuration, loaded from JSON
//! - [`ConfigError`] - configuration error type
//! - Type aliases for `FxHashMap`/`FxHashSet` (faster than std)
//!
//! Configuration is produced here, before the engine starts, and handed to
//! the engine as an owned value; no component reads global state.

#![deny(clippy::all)]
#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod hash;

// Re-export configuration types
pub use config::MonitorConfig;

// Re-export error types
pub use error::ConfigError;

// Re-export hash aliases
pub use hash::{FxHashMap, FxHashSet, fx_hash_map, fx_hash_set};
