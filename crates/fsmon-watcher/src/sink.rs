//! Buffered log persistence.
//!
//! This module provides [`LogSink`], the append-only event log writer. Log
//! lines accumulate in an in-memory buffer and reach the file in batches,
//! decoupling the rate of incoming events from the rate of I/O. An append
//! that would overflow the buffer flushes first and then proceeds, so
//! buffer pressure never drops an event; the final flush happens exactly
//! once when the monitor loop drains.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};

use camino::Utf8Path;

use crate::error::WatchError;
use crate::events::NormalizedEvent;

/// Default high-water mark of the log buffer, in bytes.
pub const DEFAULT_BUFFER_CAPACITY: usize = 8 * 1024;

/// Buffered writer for the event log.
///
/// Owned exclusively by the monitor loop; lines are appended in event order
/// and flushed when the buffer would overflow or on shutdown. Flushing an
/// already-clean buffer is a no-op, so redundant flushes cost nothing.
///
/// Generic over the destination so unit tests can write into memory; the
/// engine uses [`LogSink::open`] for an append-mode file.
#[derive(Debug)]
pub struct LogSink<W: Write> {
    writer: W,
    buffer: String,
    capacity: usize,
}

impl LogSink<File> {
    /// Opens the log file in append mode (creating it if needed) with the
    /// default buffer capacity.
    ///
    /// # Errors
    ///
    /// Returns [`WatchError::LogOpen`] if the file cannot be opened
    /// (startup-fatal for the engine).
    pub fn open(path: &Utf8Path) -> Result<Self, WatchError> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path.as_std_path())
            .map_err(|e| WatchError::log_open(path, e))?;
        Ok(Self::with_writer(file, DEFAULT_BUFFER_CAPACITY))
    }
}

impl<W: Write> LogSink<W> {
    /// Creates a sink over an arbitrary writer with the given buffer
    /// capacity.
    #[must_use]
    pub fn with_writer(writer: W, capacity: usize) -> Self {
        Self {
            writer,
            buffer: String::with_capacity(capacity.min(DEFAULT_BUFFER_CAPACITY)),
            capacity,
        }
    }

    /// Appends one event's log line to the buffer.
    ///
    /// If the line would push the buffer past its capacity, the buffer is
    /// flushed first and the append then proceeds; events are never
    /// dropped because of buffer pressure.
    ///
    /// # Errors
    ///
    /// Returns the underlying I/O error if a triggered flush fails.
    pub fn append(&mut self, event: &NormalizedEvent) -> io::Result<()> {
        let needed = event.message.len() + 1;
        if self.buffer.len() + needed > self.capacity {
            self.flush()?;
        }
        self.buffer.push_str(&event.message);
        self.buffer.push('\n');
        Ok(())
    }

    /// Writes the buffered lines to the destination and empties the buffer.
    ///
    /// A no-op when nothing has been appended since the last flush.
    ///
    /// # Errors
    ///
    /// Returns the underlying I/O error if the write or flush fails.
    pub fn flush(&mut self) -> io::Result<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        self.writer.write_all(self.buffer.as_bytes())?;
        self.writer.flush()?;
        self.buffer.clear();
        Ok(())
    }

    /// Returns the number of buffered, not-yet-flushed bytes.
    #[inline]
    #[must_use]
    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    /// Flushes and returns the underlying writer.
    ///
    /// # Errors
    ///
    /// Returns the underlying I/O error if the final flush fails.
    pub fn into_inner(mut self) -> io::Result<W> {
        self.flush()?;
        Ok(self.writer)
    }
}
