//! Recursive inotify watch engine with event normalization and buffered
//! logging.
//!
//! This crate watches a set of root directories recursively and turns raw
//! kernel change notifications into a normalized, rate-limited stream of
//! human-readable events, persisted to an append-only log and republished
//! to an observer over a channel.
//!
//! # Overview
//!
//! The engine is built from small, single-purpose parts:
//!
//! - [`EventSource`] - the kernel notification channel (inotify), the only
//!   component that performs FFI
//! - [`WatchTable`] - kernel handle ↔ directory path mapping
//! - [`registrar`] - recursive discovery and watch registration, including
//!   live extension when directories appear
//! - [`decode`] - raw record decoding from the kernel read buffer
//! - [`EventFilter`] - name/extension/stale-handle filtering and burst
//!   coalescing
//! - [`LogSink`] - buffered, batched log persistence
//! - [`Monitor`] - the background loop and the consumer-facing handle
//! - [`listing`] - on-demand flat directory listings for observers
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                   Monitor task (tokio::spawn)                   │
//! │                                                                 │
//! │  EventSource ─ read ─▶ decode ─▶ EventFilter ─▶ LogSink         │
//! │       ▲                   │           │                         │
//! │       │    directory      │           │ WatchTable.resolve      │
//! │       └── registrar ◀─────┘           ▼                         │
//! │           (extend)              mpsc::Sender                    │
//! └───────────────────────────────────────│─────────────────────────┘
//!                                         ▼
//!                        consumer: Monitor::recv() → MonitorEvent
//! ```
//!
//! # Crate Dependencies
//!
//! ```text
//! fsmon-cli ──▶ fsmon-watcher ──▶ fsmon-core
//! ```
//!
//! # Usage
//!
//! ```no_run
//! use fsmon_core::MonitorConfig;
//! use fsmon_watcher::{Monitor, MonitorEvent};
//! use camino::Utf8PathBuf;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = MonitorConfig::new(
//!         vec![Utf8PathBuf::from("/srv/data")],
//!         Utf8PathBuf::from("/var/log/fsmon.log"),
//!     );
//!
//!     let mut monitor = Monitor::spawn(&config).await?;
//!     while let Some(event) = monitor.recv().await {
//!         if let MonitorEvent::Changed(ev) = event {
//!             println!("{}", ev.message);
//!         }
//!     }
//!     monitor.shutdown().await?;
//!     Ok(())
//! }
//! ```
//!
//! # Platform Support
//!
//! Linux only (inotify).
//!
//! # Error Handling
//!
//! The crate uses [`WatchError`] for all error cases:
//!
//! ```
//! use fsmon_watcher::WatchError;
//!
//! fn handle_watch_error(err: WatchError) {
//!     if err.is_fatal() {
//!         eprintln!("fatal watcher error: {err}");
//!     } else {
//!         eprintln!("warning: {err}");
//!     }
//! }
//! ```

#![deny(clippy::all)]
#![warn(missing_docs)]

pub mod decode;
pub mod error;
pub mod events;
pub mod filter;
pub mod listing;
pub mod monitor;
pub mod registrar;
pub mod sink;
pub mod source;
pub mod table;

// Re-export error types
pub use decode::{ChangeRecord, DecodeError};
pub use error::WatchError;

// Re-export event types
pub use events::{ChangeKind, NormalizedEvent};

// Re-export filter types
pub use filter::{EventFilter, RateLimit};

// Re-export listing types
pub use listing::{DirectoryEntry, list_directory};

// Re-export monitor types
pub use monitor::{Monitor, MonitorEvent, MonitorState};

// Re-export sink types
pub use sink::LogSink;

// Re-export source types
pub use source::{EventSource, WatchHandle};

// Re-export table types
pub use table::WatchTable;
