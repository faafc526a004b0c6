//! Configuration structures for the fsmon tool.
//!
//! This module provides [`MonitorConfig`], the validated configuration that
//! the watch engine is constructed from. The configuration is read from a
//! JSON file before the engine starts; the engine itself never touches the
//! file again.
//!
//! # File Format
//!
//! ```json
//! {
//!     "roots": ["/srv/data", "/srv/uploads"],
//!     "log_file": "/var/log/fsmon.log",
//!     "filtered_extension": "tmp",
//!     "min_event_interval_ms": 1000
//! }
//! ```
//!
//! `roots` and `log_file` are required; the rest default.

use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Default minimum interval between accepted events, in milliseconds.
const DEFAULT_MIN_EVENT_INTERVAL_MS: u64 = 1_000;

fn default_min_event_interval_ms() -> u64 {
    DEFAULT_MIN_EVENT_INTERVAL_MS
}

/// Validated configuration for the monitor engine.
///
/// Constructed once at startup (usually via [`MonitorConfig::load`]) and
/// passed by reference to the engine. There is no process-wide configuration
/// state anywhere else.
///
/// # Examples
///
/// ```
/// use fsmon_core::MonitorConfig;
/// use camino::Utf8PathBuf;
///
/// let config = MonitorConfig::new(
///     vec![Utf8PathBuf::from("/srv/data")],
///     Utf8PathBuf::from("/var/log/fsmon.log"),
/// );
/// assert!(config.validate().is_ok());
/// assert_eq!(config.min_event_interval().as_secs(), 1);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Root directories to monitor recursively, in order.
    ///
    /// Must be non-empty. Each root's subtree is discovered and watched at
    /// startup; roots that cannot be watched are a startup-fatal error.
    pub roots: Vec<Utf8PathBuf>,

    /// Path of the append-only event log file.
    pub log_file: Utf8PathBuf,

    /// File extension to exclude from reporting, without the leading dot.
    ///
    /// Events for entries whose name ends in this extension are dropped
    /// before rate limiting, so they never consume the event budget.
    #[serde(default)]
    pub filtered_extension: Option<String>,

    /// Minimum interval between two accepted events, in milliseconds.
    ///
    /// Bursts of events inside the window collapse into the first one. The
    /// window is system-wide, not per-path.
    #[serde(default = "default_min_event_interval_ms")]
    pub min_event_interval_ms: u64,
}

impl MonitorConfig {
    /// Creates a configuration with the given roots and log file and default
    /// settings for everything else.
    #[must_use]
    pub fn new(roots: Vec<Utf8PathBuf>, log_file: Utf8PathBuf) -> Self {
        Self {
            roots,
            log_file,
            filtered_extension: None,
            min_event_interval_ms: DEFAULT_MIN_EVENT_INTERVAL_MS,
        }
    }

    /// Loads and validates a configuration from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read,
    /// [`ConfigError::Parse`] if it is not valid JSON for this schema, and
    /// the respective validation error if the content is structurally valid
    /// but semantically rejected (see [`MonitorConfig::validate`]).
    pub fn load(path: &Utf8Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_std_path())?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Missing`] if `roots` is empty or `log_file` is
    /// empty, and [`ConfigError::InvalidOption`] if `filtered_extension`
    /// carries a leading dot or is empty.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.roots.is_empty() {
            return Err(ConfigError::missing("roots"));
        }
        if self.log_file.as_str().is_empty() {
            return Err(ConfigError::missing("log_file"));
        }
        if let Some(ext) = &self.filtered_extension {
            if ext.is_empty() {
                return Err(ConfigError::invalid_option(
                    "filtered_extension",
                    "must not be empty when present",
                ));
            }
            if ext.starts_with('.') {
                return Err(ConfigError::invalid_option(
                    "filtered_extension",
                    "must not start with a dot",
                ));
            }
        }
        Ok(())
    }

    /// Sets the excluded file extension (builder style).
    #[must_use]
    pub fn with_filtered_extension(mut self, ext: impl Into<String>) -> Self {
        self.filtered_extension = Some(ext.into());
        self
    }

    /// Sets the minimum event interval in milliseconds (builder style).
    #[must_use]
    pub const fn with_min_event_interval_ms(mut self, ms: u64) -> Self {
        self.min_event_interval_ms = ms;
        self
    }

    /// Returns the minimum interval between accepted events as a [`Duration`].
    #[inline]
    #[must_use]
    pub const fn min_event_interval(&self) -> Duration {
        Duration::from_millis(self.min_event_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn sample() -> MonitorConfig {
        MonitorConfig::new(
            vec![Utf8PathBuf::from("/tmp/watchroot")],
            Utf8PathBuf::from("/tmp/fsmon.log"),
        )
    }

    #[test]
    fn test_defaults() {
        let config = sample();
        assert_eq!(config.min_event_interval_ms, 1_000);
        assert!(config.filtered_extension.is_none());
        assert_eq!(config.min_event_interval(), Duration::from_secs(1));
    }

    #[test]
    fn test_validate_empty_roots() {
        let config = MonitorConfig::new(Vec::new(), Utf8PathBuf::from("/tmp/fsmon.log"));
        assert!(matches!(config.validate(), Err(ConfigError::Missing(s)) if s == "roots"));
    }

    #[test]
    fn test_validate_empty_log_file() {
        let config = MonitorConfig::new(vec![Utf8PathBuf::from("/tmp")], Utf8PathBuf::new());
        assert!(matches!(config.validate(), Err(ConfigError::Missing(s)) if s == "log_file"));
    }

    #[test]
    fn test_validate_extension_with_dot() {
        let config = sample().with_filtered_extension(".tmp");
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidOption { option, .. }) if option == "filtered_extension"
        ));
    }

    #[test]
    fn test_validate_extension_without_dot() {
        let config = sample().with_filtered_extension("tmp");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_serialization_round_trip() {
        let config = sample().with_filtered_extension("tmp");
        let json = serde_json::to_string(&config).unwrap();
        let parsed: MonitorConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(config, parsed);
    }

    #[test]
    fn test_deserialize_with_missing_optional_fields() {
        let json = r#"{"roots": ["/srv/data"], "log_file": "/var/log/fsmon.log"}"#;
        let config: MonitorConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.roots, vec![Utf8PathBuf::from("/srv/data")]);
        assert!(config.filtered_extension.is_none());
        assert_eq!(config.min_event_interval_ms, 1_000);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        write!(
            file,
            r#"{{"roots": ["/srv/data"], "log_file": "/var/log/fsmon.log", "filtered_extension": "swp"}}"#
        )
        .expect("write config");

        let path = Utf8Path::from_path(file.path()).expect("utf-8 temp path");
        let config = MonitorConfig::load(path).expect("load config");
        assert_eq!(config.filtered_extension.as_deref(), Some("swp"));
    }

    #[test]
    fn test_load_rejects_invalid_json() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        write!(file, "not json").expect("write config");

        let path = Utf8Path::from_path(file.path()).expect("utf-8 temp path");
        assert!(matches!(
            MonitorConfig::load(path),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_load_missing_file() {
        let result = MonitorConfig::load(Utf8Path::new("/nonexistent/fsmon.json"));
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }
}
