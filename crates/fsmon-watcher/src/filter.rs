//! Event filtering and burst coalescing.
//!
//! This module decides which decoded records become [`NormalizedEvent`]s.
//! Filtering happens in the monitor loop, before events reach the log or
//! any observer, so rejected records cost nothing downstream.
//!
//! The checks run in a fixed order:
//!
//! 1. records without an entry name are dropped (events about the watched
//!    directory itself carry no actionable file identity)
//! 2. the configured excluded extension is dropped
//! 3. the watch handle is resolved; stale handles are dropped
//! 4. the burst limiter admits at most one event per configured interval,
//!    system-wide
//!
//! Only a record that passes all four produces an event, and only then is
//! the limiter's clock advanced; a rejected record never consumes the
//! event budget.

use std::time::{Duration, Instant};

use camino::Utf8Path;
use chrono::{DateTime, Local};

use crate::decode::ChangeRecord;
use crate::events::NormalizedEvent;
use crate::table::WatchTable;

/// Coalesces bursts of events into at most one per interval.
///
/// The window is global rather than per-path: a burst of changes anywhere
/// in the watched tree collapses into its first event. Deliberately coarse,
/// as a simple anti-flood measure.
///
/// The recorded acceptance time never moves backwards.
#[derive(Debug)]
pub struct RateLimit {
    min_interval: Duration,
    last_emitted: Option<Instant>,
}

impl RateLimit {
    /// Creates a limiter admitting at most one event per `min_interval`.
    ///
    /// A zero interval admits everything.
    #[must_use]
    pub const fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_emitted: None,
        }
    }

    /// Decides whether an event at time `now` is admitted.
    ///
    /// Admission advances the window; rejection leaves it untouched.
    pub fn accept_at(&mut self, now: Instant) -> bool {
        let admitted = match self.last_emitted {
            None => true,
            Some(last) => now
                .checked_duration_since(last)
                .is_some_and(|elapsed| elapsed >= self.min_interval),
        };
        if admitted {
            self.last_emitted = Some(now);
        }
        admitted
    }
}

/// Turns accepted change records into normalized events.
///
/// Owns the configured extension exclusion and the burst limiter. Lives on
/// the monitor loop's thread of control; nothing else touches it.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use fsmon_watcher::EventFilter;
///
/// let filter = EventFilter::new(Some("tmp".to_owned()), Duration::from_secs(1));
/// # let _ = filter;
/// ```
#[derive(Debug)]
pub struct EventFilter {
    excluded_extension: Option<String>,
    rate: RateLimit,
}

impl EventFilter {
    /// Creates a filter.
    ///
    /// `excluded_extension` is matched against the entry name's extension
    /// without the leading dot; `min_interval` is the burst window.
    #[must_use]
    pub const fn new(excluded_extension: Option<String>, min_interval: Duration) -> Self {
        Self {
            excluded_extension,
            rate: RateLimit::new(min_interval),
        }
    }

    /// Runs the filter chain on one record, stamping accepted events with
    /// the current time.
    ///
    /// Returns the normalized event if the record was accepted.
    pub fn accept(&mut self, record: &ChangeRecord, table: &WatchTable) -> Option<NormalizedEvent> {
        self.accept_at(record, table, Instant::now(), Local::now())
    }

    /// Runs the filter chain with explicit clocks.
    ///
    /// `now` drives the burst limiter, `wall` stamps the produced event.
    /// Split out so tests can exercise the timing rules deterministically.
    pub fn accept_at(
        &mut self,
        record: &ChangeRecord,
        table: &WatchTable,
        now: Instant,
        wall: DateTime<Local>,
    ) -> Option<NormalizedEvent> {
        let name = record.name.as_deref()?;

        if self.is_excluded(name) {
            tracing::trace!(name, "event filtered by extension");
            return None;
        }

        let Some(base) = table.resolve(record.handle) else {
            tracing::debug!(handle = %record.handle, name, "event for stale watch handle, discarding");
            return None;
        };
        let path = base.join(name);

        if !self.rate.accept_at(now) {
            tracing::trace!(path = %path, "event coalesced by rate limit");
            return None;
        }

        Some(NormalizedEvent::with_timestamp(path, record.kind, wall))
    }

    /// Checks the entry name against the configured excluded extension.
    fn is_excluded(&self, name: &str) -> bool {
        match &self.excluded_extension {
            Some(excluded) => Utf8Path::new(name)
                .extension()
                .is_some_and(|ext| ext == excluded),
            None => false,
        }
    }
}
