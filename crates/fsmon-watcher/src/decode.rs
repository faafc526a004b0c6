//! Raw kernel event decoding.
//!
//! This module turns the byte buffer returned by one kernel read into a
//! lazy sequence of [`ChangeRecord`]s. A read returns zero or more packed
//! records, each laid out as a fixed 16-byte native-endian header followed
//! by a variable-length, NUL-padded entry name:
//!
//! ```text
//! offset  size  field
//! ------  ----  -----------------------------------------
//!      0     4  watch descriptor (i32)
//!      4     4  event bitmask (u32)
//!      8     4  move cookie (u32, unused here)
//!     12     4  name length in bytes, including padding (u32)
//!     16   len  entry name, NUL-terminated and NUL-padded;
//!               absent entirely when len == 0
//! ```
//!
//! The decoder never reads past the valid length it is handed. A buffer
//! that ends in the middle of a record can only happen when the read was
//! mis-sized, so it is reported as a fatal [`DecodeError`] rather than
//! skipped.

use crate::events::ChangeKind;
use crate::source::WatchHandle;

/// Size of the fixed per-record header.
const HEADER_LEN: usize = 16;

/// Errors raised when a kernel buffer does not decode into whole records.
///
/// Both variants are protocol violations and fatal to the monitor loop;
/// there is no way to resynchronize a partially decoded stream.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    /// The buffer ended inside a record header.
    #[error("event buffer ends mid-header at offset {offset} ({remaining} bytes left)")]
    TruncatedHeader {
        /// Offset of the incomplete record.
        offset: usize,
        /// Bytes remaining in the buffer at that offset.
        remaining: usize,
    },

    /// The buffer ended inside a record's trailing name field.
    #[error(
        "event buffer ends mid-name at offset {offset} (declared {declared}, {remaining} bytes left)"
    )]
    TruncatedName {
        /// Offset of the record whose name is cut short.
        offset: usize,
        /// Name length the header declared.
        declared: usize,
        /// Bytes actually remaining after the header.
        remaining: usize,
    },
}

/// One decoded change record, as reported by the kernel.
///
/// Records are produced fresh per decoded buffer entry, never mutated, and
/// consumed once by the event filter. `name` is absent for events about the
/// watched directory itself and for names that are not valid UTF-8 (those
/// are logged and treated as absent).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeRecord {
    /// The kernel handle of the directory this record belongs to.
    pub handle: WatchHandle,

    /// The single change kind attached to this record.
    pub kind: ChangeKind,

    /// The affected entry's name, relative to the watched directory.
    pub name: Option<String>,

    /// The raw event bitmask, kept for the flag queries below.
    mask: u32,
}

impl ChangeRecord {
    /// Returns `true` if the affected entry is a directory.
    #[inline]
    #[must_use]
    pub const fn is_dir(&self) -> bool {
        self.mask & libc::IN_ISDIR != 0
    }

    /// Returns `true` if the kernel dropped the watch behind this handle.
    ///
    /// Emitted when the watched directory is deleted or moved away. The
    /// table entry must be reclaimed so the handle value can be reused.
    #[inline]
    #[must_use]
    pub const fn watch_dropped(&self) -> bool {
        self.mask & libc::IN_IGNORED != 0
    }

    /// Returns `true` if this record reports a new directory appearing in
    /// the watched tree (created in place or moved in), which requires
    /// extending the watch set.
    #[inline]
    #[must_use]
    pub const fn directory_appeared(&self) -> bool {
        self.is_dir() && self.mask & (libc::IN_CREATE | libc::IN_MOVED_TO) != 0
    }

    /// Returns `true` if the kernel event queue overflowed.
    ///
    /// The kernel has already discarded events at that point; the record
    /// itself carries no entry.
    #[inline]
    #[must_use]
    pub const fn queue_overflowed(&self) -> bool {
        self.mask & libc::IN_Q_OVERFLOW != 0
    }
}

#[cfg(test)]
impl ChangeRecord {
    /// Builds a record directly from its parts, bypassing the wire format.
    pub(crate) fn synthetic(wd: i32, mask: u32, name: Option<&str>) -> Self {
        Self {
            handle: WatchHandle::from_raw(wd),
            kind: ChangeKind::from_mask(mask),
            name: name.map(str::to_owned),
            mask,
        }
    }
}

/// Decodes the valid prefix of a kernel read buffer.
///
/// Returns a lazy iterator over the packed records in `buf`; pass exactly
/// the prefix the read reported as valid (`&buf[..len]`).
///
/// # Examples
///
/// ```no_run
/// use fsmon_watcher::decode;
///
/// # fn process(buf: &[u8], len: usize) -> Result<(), fsmon_watcher::DecodeError> {
/// for record in decode::decode(&buf[..len]) {
///     let record = record?;
///     println!("{:?}", record.kind);
/// }
/// # Ok(())
/// # }
/// ```
#[must_use]
pub fn decode(buf: &[u8]) -> RecordIter<'_> {
    RecordIter {
        buf,
        pos: 0,
        failed: false,
    }
}

/// Lazy iterator over the records packed into one kernel read.
///
/// Yields `Err` at most once: after a truncation error the iterator is
/// exhausted, since the remaining bytes cannot be framed.
#[derive(Debug)]
pub struct RecordIter<'a> {
    buf: &'a [u8],
    pos: usize,
    failed: bool,
}

fn read_i32(buf: &[u8], at: usize) -> i32 {
    let mut bytes = [0u8; 4];
    bytes.copy_from_slice(&buf[at..at + 4]);
    i32::from_ne_bytes(bytes)
}

fn read_u32(buf: &[u8], at: usize) -> u32 {
    let mut bytes = [0u8; 4];
    bytes.copy_from_slice(&buf[at..at + 4]);
    u32::from_ne_bytes(bytes)
}

impl Iterator for RecordIter<'_> {
    type Item = Result<ChangeRecord, DecodeError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.pos == self.buf.len() {
            return None;
        }

        let remaining = self.buf.len() - self.pos;
        if remaining < HEADER_LEN {
            self.failed = true;
            return Some(Err(DecodeError::TruncatedHeader {
                offset: self.pos,
                remaining,
            }));
        }

        let wd = read_i32(self.buf, self.pos);
        let mask = read_u32(self.buf, self.pos + 4);
        let name_len = read_u32(self.buf, self.pos + 12) as usize;

        if remaining - HEADER_LEN < name_len {
            self.failed = true;
            return Some(Err(DecodeError::TruncatedName {
                offset: self.pos,
                declared: name_len,
                remaining: remaining - HEADER_LEN,
            }));
        }

        let name_bytes = &self.buf[self.pos + HEADER_LEN..self.pos + HEADER_LEN + name_len];
        self.pos += HEADER_LEN + name_len;

        // The name is NUL-terminated and padded to the declared length
        let trimmed = name_bytes
            .iter()
            .position(|&b| b == 0)
            .map_or(name_bytes, |end| &name_bytes[..end]);
        let name = if trimmed.is_empty() {
            None
        } else {
            match std::str::from_utf8(trimmed) {
                Ok(name) => Some(name.to_owned()),
                Err(_) => {
                    tracing::warn!(wd, "skipping non-UTF-8 entry name in event record");
                    None
                }
            }
        };

        Some(Ok(ChangeRecord {
            handle: WatchHandle::from_raw(wd),
            kind: ChangeKind::from_mask(mask),
            name,
            mask,
        }))
    }
}
