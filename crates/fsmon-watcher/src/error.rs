//! Error types for the fsmon-watcher crate.
//!
//! This module provides the [`WatchError`] type for errors that can occur
//! while setting up or running the watch engine.

use camino::Utf8PathBuf;

use crate::decode::DecodeError;

/// Errors that can occur during watch engine operations.
///
/// These errors cover kernel event-source failures, watch registration,
/// event decoding, log persistence, and channel communication.
///
/// # Error Recovery Strategy
///
/// - **Init errors** ([`WatchError::Init`]): Fatal at startup - the kernel
///   event source could not be created
/// - **Registration errors** ([`WatchError::Registration`]): Fatal for a
///   configured root at startup; recoverable when extending the watch set
///   for a directory created while running (logged, skipped)
/// - **Read errors** ([`WatchError::Read`]): Fatal - a broken notification
///   channel cannot be recovered; the loop drains and stops
/// - **Decode errors** ([`WatchError::Decode`]): Fatal - a malformed kernel
///   buffer means the read was mis-sized
/// - **Log errors** ([`WatchError::LogOpen`], [`WatchError::Log`]): Fatal -
///   events could no longer be persisted
/// - **Channel closed** ([`WatchError::ChannelClosed`]): Fatal - the monitor
///   task went away without reporting a result
#[derive(Debug, thiserror::Error)]
pub enum WatchError {
    /// Failed to initialize the kernel event source.
    #[error("failed to initialize the kernel event source: {0}")]
    Init(#[source] std::io::Error),

    /// Failed to register a watch on a directory.
    #[error("failed to register a watch on {path}: {source}")]
    Registration {
        /// The directory that could not be watched.
        path: Utf8PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to read the next batch of events from the kernel.
    #[error("failed to read from the kernel event source: {0}")]
    Read(#[source] std::io::Error),

    /// The kernel returned a buffer that does not decode into whole records.
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// Failed to open the event log file.
    #[error("failed to open log file {path}: {source}")]
    LogOpen {
        /// The log file path.
        path: Utf8PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to write or flush the event log.
    #[error("failed to write the event log: {0}")]
    Log(#[source] std::io::Error),

    /// The monitor task ended without reporting a result.
    #[error("monitor task ended unexpectedly")]
    ChannelClosed,
}

impl WatchError {
    /// Creates a new [`WatchError::Registration`] error.
    #[inline]
    pub fn registration(path: impl Into<Utf8PathBuf>, source: std::io::Error) -> Self {
        Self::Registration {
            path: path.into(),
            source,
        }
    }

    /// Creates a new [`WatchError::LogOpen`] error.
    #[inline]
    pub fn log_open(path: impl Into<Utf8PathBuf>, source: std::io::Error) -> Self {
        Self::LogOpen {
            path: path.into(),
            source,
        }
    }

    /// Returns `true` if this error is recoverable (watching can continue).
    ///
    /// Only per-directory registration failures are recoverable: the
    /// affected subtree is skipped and the rest of the watch set stays
    /// valid. At startup the caller still treats a failed configured root
    /// as fatal.
    #[inline]
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(self, Self::Registration { .. })
    }

    /// Returns `true` if this error is fatal (watching should stop).
    #[inline]
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        !self.is_recoverable()
    }

    /// Returns the path associated with this error, if any.
    #[must_use]
    pub fn path(&self) -> Option<&Utf8PathBuf> {
        match self {
            Self::Registration { path, .. } | Self::LogOpen { path, .. } => Some(path),
            Self::Init(_)
            | Self::Read(_)
            | Self::Decode(_)
            | Self::Log(_)
            | Self::ChannelClosed => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_registration_error() {
        let err = WatchError::registration(
            "/srv/data/private",
            io::Error::new(io::ErrorKind::PermissionDenied, "access denied"),
        );
        assert!(err.is_recoverable());
        assert!(!err.is_fatal());
        assert_eq!(err.path().map(|p| p.as_str()), Some("/srv/data/private"));
        assert!(err.to_string().contains("/srv/data/private"));
    }

    #[test]
    fn test_init_error_is_fatal() {
        let err = WatchError::Init(io::Error::other("no inotify"));
        assert!(err.is_fatal());
        assert!(err.path().is_none());
        assert!(err.to_string().contains("kernel event source"));
    }

    #[test]
    fn test_read_error_is_fatal() {
        let err = WatchError::Read(io::Error::new(io::ErrorKind::BrokenPipe, "gone"));
        assert!(err.is_fatal());
        assert!(err.path().is_none());
    }

    #[test]
    fn test_log_open_error() {
        let err = WatchError::log_open(
            "/var/log/fsmon.log",
            io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        );
        assert!(err.is_fatal());
        assert_eq!(err.path().map(|p| p.as_str()), Some("/var/log/fsmon.log"));
    }
}
