//! Kernel event source: a thin wrapper around Linux inotify.
//!
//! This module is the only place in the workspace that talks to the kernel
//! notification API, and the only place that contains `unsafe` (the four
//! inotify/read FFI calls). Everything above it works with [`WatchHandle`]
//! values and raw byte buffers.
//!
//! The inotify descriptor is opened non-blocking and registered with the
//! tokio reactor via [`AsyncFd`], so [`EventSource::read_batch`] is an async
//! suspension point that can be raced against a shutdown signal with
//! `tokio::select!` instead of requiring the descriptor to be closed from
//! another thread to interrupt a blocked read.

#![allow(unsafe_code)]

use std::ffi::CString;
use std::io;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd};

use camino::Utf8Path;
use tokio::io::unix::AsyncFd;

/// Event bits requested for every watched directory.
///
/// Matches the change kinds the engine reports: entry creation and removal
/// (including moves in and out), access, close-after-write, modification,
/// and the directory itself being moved. `IN_ONLYDIR` makes the kernel
/// reject non-directories that race in between the walk and the watch call,
/// and `IN_DONT_FOLLOW` keeps symlinked directories out of the watch set.
pub(crate) const WATCH_MASK: u32 = libc::IN_CREATE
    | libc::IN_DELETE
    | libc::IN_ACCESS
    | libc::IN_CLOSE_WRITE
    | libc::IN_MODIFY
    | libc::IN_MOVE_SELF
    | libc::IN_MOVED_FROM
    | libc::IN_MOVED_TO
    | libc::IN_ONLYDIR
    | libc::IN_DONT_FOLLOW;

/// An opaque kernel watch identifier.
///
/// Returned by the kernel when a directory is registered for change
/// notification. Only the [`EventSource`] and the watch table interpret
/// handles; to everything else they are tokens. Handle values may be reused
/// by the kernel after a watch is removed, which is why the table reclaims
/// slots eagerly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WatchHandle(i32);

impl WatchHandle {
    /// Wraps a raw kernel watch descriptor.
    #[inline]
    #[must_use]
    pub(crate) const fn from_raw(wd: i32) -> Self {
        Self(wd)
    }
}

impl std::fmt::Display for WatchHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The kernel notification channel for one engine instance.
///
/// Owns the inotify file descriptor; dropping the source releases the
/// descriptor and with it every registered watch.
#[derive(Debug)]
pub struct EventSource {
    fd: AsyncFd<OwnedFd>,
}

impl EventSource {
    /// Creates a new kernel event source.
    ///
    /// # Errors
    ///
    /// Returns the underlying I/O error if the inotify instance cannot be
    /// created or registered with the async reactor (startup-fatal for the
    /// engine).
    pub fn new() -> io::Result<Self> {
        let raw = unsafe { libc::inotify_init1(libc::IN_NONBLOCK | libc::IN_CLOEXEC) };
        if raw < 0 {
            return Err(io::Error::last_os_error());
        }
        // Safety: `raw` is a freshly created descriptor we exclusively own.
        let owned = unsafe { OwnedFd::from_raw_fd(raw) };
        Ok(Self {
            fd: AsyncFd::new(owned)?,
        })
    }

    /// Registers a watch on a directory and returns its kernel handle.
    ///
    /// Watching the same directory twice returns the same handle; the
    /// kernel deduplicates per path.
    ///
    /// # Errors
    ///
    /// Returns the underlying I/O error if the path cannot be watched
    /// (vanished, permission denied, not a directory, watch limit reached).
    pub fn add_watch(&self, path: &Utf8Path) -> io::Result<WatchHandle> {
        let c_path = CString::new(path.as_str())
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
        let wd = unsafe {
            libc::inotify_add_watch(self.fd.as_raw_fd(), c_path.as_ptr(), WATCH_MASK)
        };
        if wd < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(WatchHandle::from_raw(wd))
    }

    /// Reads the next batch of raw event records into `buf`.
    ///
    /// Waits until the descriptor is readable, then fills `buf` with as many
    /// whole records as the kernel has queued and returns the valid length.
    /// The returned prefix of `buf` is what [`crate::decode::decode`]
    /// consumes.
    ///
    /// Cancel safe: if the future is dropped before completion no data has
    /// been consumed from the kernel queue.
    ///
    /// # Errors
    ///
    /// Returns the underlying I/O error if the read fails; the engine treats
    /// this as fatal.
    pub async fn read_batch(&self, buf: &mut [u8]) -> io::Result<usize> {
        loop {
            let mut guard = self.fd.readable().await?;
            match guard.try_io(|inner| {
                let res = unsafe {
                    libc::read(
                        inner.as_raw_fd(),
                        buf.as_mut_ptr().cast::<libc::c_void>(),
                        buf.len(),
                    )
                };
                if res < 0 {
                    Err(io::Error::last_os_error())
                } else {
                    usize::try_from(res).map_err(|_| io::Error::last_os_error())
                }
            }) {
                Ok(Ok(len)) => return Ok(len),
                Ok(Err(e)) if e.kind() == io::ErrorKind::WouldBlock => continue,
                Ok(Err(e)) => return Err(e),
                Err(_would_block) => continue,
            }
        }
    }
}
