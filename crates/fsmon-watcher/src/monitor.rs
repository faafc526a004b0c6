//! The monitor loop and its owning handle.
//!
//! This module wires the engine together: it runs the long-lived
//! read → decode → filter → log pipeline as a background tokio task and
//! exposes [`Monitor`], the handle the consumer side uses to receive
//! events and to stop the engine.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                   Monitor task (tokio::spawn)                   │
//! │  ┌─────────────┐   ┌─────────┐   ┌─────────────┐   ┌─────────┐  │
//! │  │ EventSource │ → │ decode  │ → │ EventFilter │ → │ LogSink │  │
//! │  │ (AsyncFd)   │   │         │   │ (WatchTable)│   │         │  │
//! │  └─────────────┘   └─────────┘   └──────┬──────┘   └─────────┘  │
//! └──────────────────────────────────────── │ ─────────────────────┘
//!                                    send   │   copies, never shared
//!                                           ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                     Consumer task / thread                      │
//! │  ┌──────────────────┐    ┌────────────────┐                     │
//! │  │ Monitor          │    │ mpsc::Receiver │ → print / UI / ...  │
//! │  │ (shutdown ctrl)  │    │ (MonitorEvent) │                     │
//! │  └──────────────────┘    └────────────────┘                     │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # State machine
//!
//! `Idle → Watching → Draining → Stopped`. The engine is Idle while
//! [`Monitor::spawn`] runs the initial registration pass; the loop enters
//! Watching and announces it once on the event channel; a stop signal or a
//! fatal read/decode/log error moves it to Draining, where the log is
//! flushed exactly once and the kernel event source is released.
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
//!     let mut monitor = Monitor::spawn(&config).await?;
//!
//!     while let Some(event) = monitor.recv().await {
//!         match event {
//!             MonitorEvent::Watching => println!("waiting for events..."),
//!             MonitorEvent::Changed(ev) => println!("{}", ev.message),
//!         }
//!     }
//!
//!     monitor.shutdown().await?;
//!     Ok(())
//! }
//! ```

use std::fs::File;

use smallvec::SmallVec;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use fsmon_core::MonitorConfig;

use crate::decode::{self, ChangeRecord};
use crate::error::WatchError;
use crate::events::NormalizedEvent;
use crate::filter::EventFilter;
use crate::registrar;
use crate::sink::LogSink;
use crate::source::EventSource;
use crate::table::WatchTable;

/// Capacity of the observer event channel.
const DEFAULT_CHANNEL_CAPACITY: usize = 100;

/// Size of the kernel read buffer; holds several records per read.
const READ_BUFFER_LEN: usize = 4096;

/// Lifecycle states of the monitor loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorState {
    /// Initial watch registration is still in progress.
    Idle,
    /// Blocking on the kernel event source and processing batches.
    Watching,
    /// Flushing the log and releasing resources.
    Draining,
    /// The loop has ended.
    Stopped,
}

/// A message from the monitor loop to its observers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MonitorEvent {
    /// Sent once when the loop starts waiting for kernel events.
    Watching,
    /// An accepted, normalized change event.
    Changed(NormalizedEvent),
}

/// Handle to a running monitor engine.
///
/// # Lifecycle
///
/// 1. **Spawn**: [`Monitor::spawn`] creates the kernel event source, walks
///    and watches every configured root, opens the log sink, and starts the
///    background loop. Any failure here is startup-fatal and nothing is
///    left running.
///
/// 2. **Receive**: [`Monitor::recv`] / [`Monitor::try_recv`] yield
///    [`MonitorEvent`]s. Events are owned copies; the consumer never shares
///    state with the loop.
///
/// 3. **Shutdown**: [`Monitor::shutdown`] signals the loop, awaits the
///    drain (final log flush, event source release), and surfaces the
///    loop's result. Dropping the handle signals shutdown without waiting.
#[derive(Debug)]
pub struct Monitor {
    /// Shutdown signal sender; `None` once shutdown was initiated.
    shutdown_tx: Option<oneshot::Sender<()>>,

    /// Handle to the background loop, awaited during shutdown.
    task_handle: Option<JoinHandle<Result<(), WatchError>>>,

    /// Observer side of the event channel.
    event_rx: mpsc::Receiver<MonitorEvent>,

    /// Number of directories watched by the initial pass.
    watch_count: usize,
}

impl Monitor {
    /// Starts the engine for the given configuration.
    ///
    /// Walks every configured root (children before parents), registers
    /// the watches, opens the log file, and spawns the monitor loop.
    ///
    /// # Errors
    ///
    /// Returns [`WatchError::Init`] if the kernel event source cannot be
    /// created, [`WatchError::Registration`] if a configured root cannot be
    /// watched, and [`WatchError::LogOpen`] if the log file cannot be
    /// opened. All are startup-fatal.
    pub async fn spawn(config: &MonitorConfig) -> Result<Self, WatchError> {
        let source = EventSource::new().map_err(WatchError::Init)?;
        let mut table = WatchTable::new();

        tracing::info!(
            state = ?MonitorState::Idle,
            roots = config.roots.len(),
            "registering initial watches"
        );
        for root in &config.roots {
            let added = registrar::watch_recursive(&source, &mut table, root)?;
            tracing::info!(root = %root, added, "root registered");
        }

        let sink = LogSink::open(&config.log_file)?;
        let filter = EventFilter::new(
            config.filtered_extension.clone(),
            config.min_event_interval(),
        );

        let watch_count = table.len();
        let (event_tx, event_rx) = mpsc::channel(DEFAULT_CHANNEL_CAPACITY);
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        let pipeline = Pipeline {
            source,
            table,
            filter,
            sink,
            event_tx,
        };
        let task_handle = tokio::spawn(run_monitor_loop(pipeline, shutdown_rx));

        Ok(Self {
            shutdown_tx: Some(shutdown_tx),
            task_handle: Some(task_handle),
            event_rx,
            watch_count,
        })
    }

    /// Receives the next monitor event.
    ///
    /// Returns `None` once the loop has ended and all queued events were
    /// consumed; call [`Monitor::shutdown`] to learn how it ended.
    pub async fn recv(&mut self) -> Option<MonitorEvent> {
        self.event_rx.recv().await
    }

    /// Tries to receive a monitor event without waiting.
    pub fn try_recv(&mut self) -> Result<MonitorEvent, mpsc::error::TryRecvError> {
        self.event_rx.try_recv()
    }

    /// Returns the number of directories watched by the initial pass.
    ///
    /// Live extensions are not reflected here; this is the startup figure.
    #[inline]
    #[must_use]
    pub const fn watch_count(&self) -> usize {
        self.watch_count
    }

    /// Returns `true` if the monitor loop is still running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.shutdown_tx.is_some() && self.task_handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Stops the engine and waits for it to drain.
    ///
    /// The loop flushes the log exactly once and releases the kernel event
    /// source before this returns.
    ///
    /// # Errors
    ///
    /// Returns the loop's fatal error if it stopped on its own (read or
    /// decode failure, log I/O failure), or [`WatchError::ChannelClosed`]
    /// if the task ended without reporting a result.
    pub async fn shutdown(mut self) -> Result<(), WatchError> {
        if let Some(tx) = self.shutdown_tx.take() {
            // The loop may already have ended; that is fine
            let _ = tx.send(());
        }

        if let Some(handle) = self.task_handle.take() {
            match handle.await {
                Ok(result) => result?,
                Err(_join_error) => return Err(WatchError::ChannelClosed),
            }
        }

        Ok(())
    }
}

impl Drop for Monitor {
    fn drop(&mut self) {
        // Signal shutdown on drop; Drop is sync, so the drain is not awaited
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

/// The components owned by the monitor loop.
///
/// Everything in here lives on the loop's task; the consumer side only
/// ever sees owned [`MonitorEvent`] copies.
struct Pipeline {
    source: EventSource,
    table: WatchTable,
    filter: EventFilter,
    sink: LogSink<File>,
    event_tx: mpsc::Sender<MonitorEvent>,
}

/// Runs the read → decode → filter → log pipeline until stopped.
async fn run_monitor_loop(
    mut pipeline: Pipeline,
    mut shutdown_rx: oneshot::Receiver<()>,
) -> Result<(), WatchError> {
    let mut state = MonitorState::Watching;
    tracing::info!(?state, watches = pipeline.table.len(), "waiting for events");
    let _ = pipeline.event_tx.send(MonitorEvent::Watching).await;

    let mut buf = vec![0u8; READ_BUFFER_LEN];
    let outcome = loop {
        tokio::select! {
            // Also fires if the Monitor handle is dropped
            _ = &mut shutdown_rx => break Ok(()),
            read = pipeline.source.read_batch(&mut buf) => match read {
                Ok(len) => {
                    if let Err(error) = process_batch(&mut pipeline, &buf[..len]).await {
                        break Err(error);
                    }
                }
                Err(error) => break Err(WatchError::Read(error)),
            }
        }
    };

    state = MonitorState::Draining;
    tracing::debug!(?state, "flushing event log");
    let flush_result = pipeline.sink.flush().map_err(WatchError::Log);
    drop(pipeline.source); // releases the descriptor and every watch

    state = MonitorState::Stopped;
    match &outcome {
        Ok(()) => tracing::info!(?state, "monitor loop stopped"),
        Err(error) => tracing::error!(?state, %error, "monitor loop stopped on fatal error"),
    }

    outcome.and(flush_result)
}

/// Processes one kernel read's worth of records.
///
/// Decode errors and log write errors are fatal and bubble up; everything
/// else is handled per record.
async fn process_batch(pipeline: &mut Pipeline, buf: &[u8]) -> Result<(), WatchError> {
    let records: SmallVec<[ChangeRecord; 16]> =
        decode::decode(buf).collect::<Result<_, _>>()?;

    for record in records {
        if record.queue_overflowed() {
            tracing::warn!("kernel event queue overflowed, events were dropped");
            continue;
        }

        if record.watch_dropped() {
            // The directory is gone; reclaim the slot so the kernel can
            // reuse the handle without aliasing
            if let Some(path) = pipeline.table.unregister(record.handle) {
                tracing::debug!(path = %path, "watch removed");
            }
            continue;
        }

        if record.directory_appeared() {
            extend_watches(pipeline, &record);
        }

        if let Some(event) = pipeline.filter.accept(&record, &pipeline.table) {
            pipeline.sink.append(&event).map_err(WatchError::Log)?;
            // Observers get their own copy; a consumer that went away must
            // not stop the log
            let _ = pipeline.event_tx.send(MonitorEvent::Changed(event)).await;
        }
    }

    Ok(())
}

/// Brings a directory that appeared inside the watched tree under watch.
fn extend_watches(pipeline: &mut Pipeline, record: &ChangeRecord) {
    let Some(name) = record.name.as_deref() else {
        return;
    };
    let Some(base) = pipeline.table.resolve(record.handle) else {
        tracing::debug!(handle = %record.handle, "stale handle on new directory, not extending");
        return;
    };
    let new_dir = base.join(name);

    match registrar::watch_recursive(&pipeline.source, &mut pipeline.table, &new_dir) {
        Ok(added) => tracing::info!(path = %new_dir, added, "watch set extended"),
        Err(error) => {
            // The directory may already be gone again; coverage of the
            // rest of the tree is unaffected
            tracing::warn!(path = %new_dir, %error, "could not extend watch set");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::ChangeKind;
    use camino::Utf8PathBuf;
    use std::fs;
    use std::time::Duration;
    use tempfile::TempDir;

    fn utf8_path(dir: &TempDir) -> Utf8PathBuf {
        Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("utf-8 temp path")
    }

    /// Config over a temp root with no rate limiting, so tests do not have
    /// to sleep through the production window.
    fn test_config(root: &Utf8PathBuf, log_dir: &TempDir) -> MonitorConfig {
        let log_file =
            Utf8PathBuf::from_path_buf(log_dir.path().join("fsmon.log")).expect("utf-8 log path");
        MonitorConfig::new(vec![root.clone()], log_file).with_min_event_interval_ms(0)
    }

    async fn next_changed(monitor: &mut Monitor) -> Option<NormalizedEvent> {
        loop {
            let event = tokio::time::timeout(Duration::from_secs(2), monitor.recv())
                .await
                .ok()??;
            match event {
                MonitorEvent::Watching => continue,
                MonitorEvent::Changed(ev) => return Some(ev),
            }
        }
    }

    #[tokio::test]
    async fn test_spawn_registers_roots_and_announces_watching() {
        let temp = TempDir::new().expect("temp dir");
        let log_dir = TempDir::new().expect("log dir");
        let root = utf8_path(&temp);
        fs::create_dir(root.join("a").as_std_path()).expect("dir");

        let mut monitor = Monitor::spawn(&test_config(&root, &log_dir))
            .await
            .expect("spawn");

        assert!(monitor.is_running());
        assert_eq!(monitor.watch_count(), 2);
        let first = tokio::time::timeout(Duration::from_secs(2), monitor.recv())
            .await
            .expect("timely")
            .expect("event");
        assert_eq!(first, MonitorEvent::Watching);

        monitor.shutdown().await.expect("shutdown");
    }

    #[tokio::test]
    async fn test_spawn_missing_root_fails() {
        let log_dir = TempDir::new().expect("log dir");
        let config = test_config(&Utf8PathBuf::from("/nonexistent/fsmon"), &log_dir);

        let result = Monitor::spawn(&config).await;
        assert!(matches!(result, Err(WatchError::Registration { .. })));
    }

    #[tokio::test]
    async fn test_spawn_bad_log_path_fails() {
        let temp = TempDir::new().expect("temp dir");
        let root = utf8_path(&temp);
        let config = MonitorConfig::new(
            vec![root],
            Utf8PathBuf::from("/nonexistent/dir/fsmon.log"),
        );

        let result = Monitor::spawn(&config).await;
        assert!(matches!(result, Err(WatchError::LogOpen { .. })));
    }

    #[tokio::test]
    async fn test_file_creation_in_subdirectory_is_reported() {
        let temp = TempDir::new().expect("temp dir");
        let log_dir = TempDir::new().expect("log dir");
        let root = utf8_path(&temp);
        fs::create_dir(root.join("a").as_std_path()).expect("dir");

        let mut monitor = Monitor::spawn(&test_config(&root, &log_dir))
            .await
            .expect("spawn");

        fs::write(root.join("a/x.txt").as_std_path(), "hello").expect("file");

        let event = next_changed(&mut monitor).await.expect("changed event");
        assert_eq!(event.kind, ChangeKind::Created);
        assert_eq!(event.path, root.join("a/x.txt"));
        assert!(event.message.contains("File "));
        assert!(event.message.ends_with("created"));

        monitor.shutdown().await.expect("shutdown");
    }

    #[tokio::test]
    async fn test_accepted_events_reach_the_log_file() {
        let temp = TempDir::new().expect("temp dir");
        let log_dir = TempDir::new().expect("log dir");
        let root = utf8_path(&temp);
        let config = test_config(&root, &log_dir);

        let mut monitor = Monitor::spawn(&config).await.expect("spawn");
        fs::write(root.join("x.txt").as_std_path(), "hello").expect("file");
        let event = next_changed(&mut monitor).await.expect("changed event");
        monitor.shutdown().await.expect("shutdown");

        let log = fs::read_to_string(config.log_file.as_std_path()).expect("read log");
        assert!(
            log.contains(&event.message),
            "log {log:?} should contain {:?}",
            event.message
        );
    }

    #[tokio::test]
    async fn test_excluded_extension_produces_no_events() {
        let temp = TempDir::new().expect("temp dir");
        let log_dir = TempDir::new().expect("log dir");
        let root = utf8_path(&temp);
        let config = test_config(&root, &log_dir).with_filtered_extension("tmp");

        let mut monitor = Monitor::spawn(&config).await.expect("spawn");
        fs::write(root.join("y.tmp").as_std_path(), "scratch").expect("file");

        // Watching arrives; no Changed event may follow for the .tmp file
        let first = tokio::time::timeout(Duration::from_secs(2), monitor.recv())
            .await
            .expect("timely")
            .expect("event");
        assert_eq!(first, MonitorEvent::Watching);
        let followup = tokio::time::timeout(Duration::from_millis(500), monitor.recv()).await;
        assert!(followup.is_err(), "unexpected event: {followup:?}");

        monitor.shutdown().await.expect("shutdown");
    }

    #[tokio::test]
    async fn test_new_directory_is_watched_dynamically() {
        let temp = TempDir::new().expect("temp dir");
        let log_dir = TempDir::new().expect("log dir");
        let root = utf8_path(&temp);

        let mut monitor = Monitor::spawn(&test_config(&root, &log_dir))
            .await
            .expect("spawn");

        fs::create_dir(root.join("b").as_std_path()).expect("dir");
        let dir_event = next_changed(&mut monitor).await.expect("dir event");
        assert_eq!(dir_event.kind, ChangeKind::Created);
        assert_eq!(dir_event.path, root.join("b"));

        // Give the loop a moment to extend the watch set, then create a
        // file inside the brand-new directory
        tokio::time::sleep(Duration::from_millis(300)).await;
        fs::write(root.join("b/z.txt").as_std_path(), "hello").expect("file");

        let file_event = next_changed(&mut monitor).await.expect("file event");
        assert_eq!(file_event.kind, ChangeKind::Created);
        assert_eq!(file_event.path, root.join("b/z.txt"));

        monitor.shutdown().await.expect("shutdown");
    }

    #[tokio::test]
    async fn test_shutdown_flushes_and_stops() {
        let temp = TempDir::new().expect("temp dir");
        let log_dir = TempDir::new().expect("log dir");
        let root = utf8_path(&temp);
        let config = test_config(&root, &log_dir);

        let monitor = Monitor::spawn(&config).await.expect("spawn");
        assert!(monitor.is_running());
        monitor.shutdown().await.expect("shutdown");

        // The log file exists even if nothing was written
        assert!(config.log_file.as_std_path().exists());
    }
}
