//! Error types for the fsmon-core crate.
//!
//! This module provides the [`ConfigError`] type for configuration-related
//! errors that can occur across the workspace.

use camino::Utf8PathBuf;

/// Errors that can occur during configuration loading and validation.
///
/// This error type covers all configuration-related failures including
/// missing required settings, invalid option values, and parsing errors.
///
/// # Examples
///
/// ```
/// use fsmon_core::ConfigError;
///
/// let error = ConfigError::missing("log_file");
/// assert!(error.to_string().contains("log_file"));
/// ```
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A required configuration setting is absent or empty.
    #[error("missing required setting '{0}' in configuration")]
    Missing(String),

    /// The provided path is invalid or malformed.
    #[error("invalid path '{path}': {reason}")]
    InvalidPath {
        /// The invalid path.
        path: Utf8PathBuf,
        /// Explanation of why the path is invalid.
        reason: String,
    },

    /// A configuration option has an invalid value.
    #[error("invalid configuration option '{option}': {reason}")]
    InvalidOption {
        /// The name of the invalid option.
        option: String,
        /// Explanation of why the option is invalid.
        reason: String,
    },

    /// An I/O error occurred while reading configuration.
    #[error("failed to read configuration: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to parse the configuration file.
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] serde_json::Error),
}

impl ConfigError {
    /// Creates a new [`ConfigError::Missing`] error.
    #[inline]
    pub fn missing(setting: impl Into<String>) -> Self {
        Self::Missing(setting.into())
    }

    /// Creates a new [`ConfigError::InvalidOption`] error.
    #[inline]
    pub fn invalid_option(option: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidOption {
            option: option.into(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_display() {
        let error = ConfigError::missing("roots");
        assert_eq!(
            error.to_string(),
            "missing required setting 'roots' in configuration"
        );
    }

    #[test]
    fn test_invalid_path_display() {
        let error = ConfigError::InvalidPath {
            path: Utf8PathBuf::from("/invalid/path"),
            reason: "path is not a directory".to_owned(),
        };
        let msg = error.to_string();
        assert!(msg.contains("/invalid/path"));
        assert!(msg.contains("not a directory"));
    }

    #[test]
    fn test_invalid_option_display() {
        let error = ConfigError::invalid_option("filtered_extension", "must not start with a dot");
        let msg = error.to_string();
        assert!(msg.contains("filtered_extension"));
        assert!(msg.contains("must not start with a dot"));
    }
}
