//! Event types for normalized filesystem change notifications.
//!
//! This module provides [`ChangeKind`], the category of a reported change,
//! and [`NormalizedEvent`], the fully resolved, formatted event that the
//! engine logs and republishes to observers.
//!
//! # Event Flow
//!
//! ```text
//! raw kernel record (handle, bitmask, name)
//!        │
//!        ▼
//!   ChangeKind::from_mask  (one kind per record, fixed precedence)
//!        │
//!        ▼
//!   EventFilter (extension / stale handle / rate limit)
//!        │
//!        ▼
//!   NormalizedEvent (timestamp + absolute path + message)
//! ```

use camino::Utf8PathBuf;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

/// The category of filesystem mutation reported for an entry.
///
/// A raw kernel record can carry several event bits at once; exactly one
/// kind is attached per record using a fixed first-match precedence:
/// created, removed, accessed, written-and-closed, modified,
/// moved-or-renamed, and unknown as the fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    /// An entry was created (or moved into a watched directory).
    Created,
    /// An entry was removed (or moved out of a watched directory).
    Removed,
    /// An entry was accessed (read).
    Accessed,
    /// An entry opened for writing was closed.
    WrittenAndClosed,
    /// An entry's content was modified.
    Modified,
    /// An entry was moved or renamed.
    MovedOrRenamed,
    /// The record carried none of the recognized event bits.
    Unknown,
}

impl ChangeKind {
    /// Maps a raw kernel event bitmask to a single change kind.
    ///
    /// Multiple bits may be set in one record; the first match in the fixed
    /// precedence order wins.
    #[must_use]
    pub(crate) fn from_mask(mask: u32) -> Self {
        if mask & libc::IN_CREATE != 0 {
            Self::Created
        } else if mask & libc::IN_DELETE != 0 {
            Self::Removed
        } else if mask & libc::IN_ACCESS != 0 {
            Self::Accessed
        } else if mask & libc::IN_CLOSE_WRITE != 0 {
            Self::WrittenAndClosed
        } else if mask & libc::IN_MODIFY != 0 {
            Self::Modified
        } else if mask & (libc::IN_MOVE_SELF | libc::IN_MOVED_FROM | libc::IN_MOVED_TO) != 0 {
            // moved-to also counts as a creation from the tree's point of
            // view, but IN_CREATE and IN_MOVED_TO never share a record
            Self::MovedOrRenamed
        } else {
            Self::Unknown
        }
    }

    /// Returns the word used for this kind in log lines.
    ///
    /// # Examples
    ///
    /// ```
    /// use fsmon_watcher::ChangeKind;
    ///
    /// assert_eq!(ChangeKind::Created.label(), "created");
    /// assert_eq!(ChangeKind::WrittenAndClosed.label(), "written and closed");
    /// ```
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Removed => "deleted",
            Self::Accessed => "accessed",
            Self::WrittenAndClosed => "written and closed",
            Self::Modified => "modified",
            Self::MovedOrRenamed => "moved",
            Self::Unknown => "unknown event",
        }
    }
}

impl std::fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// A fully resolved, formatted change event.
///
/// Produced by the event filter once a raw record has survived filtering and
/// its watch handle has been resolved to a directory. The event owns its
/// data and is cloned by value across the observer channel; the engine never
/// shares mutable state with consumers.
///
/// # Examples
///
/// ```
/// use fsmon_watcher::{ChangeKind, NormalizedEvent};
/// use camino::Utf8PathBuf;
///
/// let event = NormalizedEvent::new(
///     Utf8PathBuf::from("/srv/data/report.txt"),
///     ChangeKind::Created,
/// );
/// assert!(event.message.ends_with("File /srv/data/report.txt: created"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedEvent {
    /// Wall-clock time the event was accepted.
    pub timestamp: DateTime<Local>,

    /// Absolute path of the affected entry (watched directory + entry name).
    pub path: Utf8PathBuf,

    /// The kind of change.
    pub kind: ChangeKind,

    /// The formatted log line for this event (without trailing newline):
    /// `[<YYYY-MM-DD HH:MM:SS>] File <path>: <kind word>`.
    pub message: String,
}

impl NormalizedEvent {
    /// Creates an event stamped with the current wall-clock time.
    #[must_use]
    pub fn new(path: Utf8PathBuf, kind: ChangeKind) -> Self {
        Self::with_timestamp(path, kind, Local::now())
    }

    /// Creates an event with an explicit timestamp.
    ///
    /// Useful for testing and for callers that already sampled the clock.
    #[must_use]
    pub fn with_timestamp(path: Utf8PathBuf, kind: ChangeKind, timestamp: DateTime<Local>) -> Self {
        let message = format!(
            "[{}] File {}: {}",
            timestamp.format("%Y-%m-%d %H:%M:%S"),
            path,
            kind.label()
        );
        Self {
            timestamp,
            path,
            kind,
            message,
        }
    }

    /// Returns the file name component of the affected path, if any.
    #[inline]
    #[must_use]
    pub fn file_name(&self) -> Option<&str> {
        self.path.file_name()
    }
}
