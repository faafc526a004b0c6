//! CLI entry point for the fsmon filesystem monitor.
//!
//! This binary loads a JSON configuration file, starts the watch engine,
//! and acts as its console consumer: every accepted event is printed to
//! stdout while the engine appends it to the configured log file.
//!
//! # Usage
//!
//! ```bash
//! fsmon CONFIG [-v|--verbose] [--no-color]
//!
//! # with a config file like:
//! # { "roots": ["/srv/data"], "log_file": "/var/log/fsmon.log",
//! #   "filtered_extension": "tmp" }
//! fsmon /etc/fsmon.json
//! ```
//!
//! # Exit Codes
//!
//! - `0` - normal shutdown (interrupt or SIGTERM)
//! - `1` - missing or invalid command-line arguments
//! - `2` - kernel event-source initialization failed
//! - `3` - watch registration on a configured root failed
//! - `5` - event-source read failed or a malformed event buffer was seen
//! - `6` - configuration could not be read/parsed, or the log file could
//!   not be opened or written

#![deny(clippy::all)]
#![warn(missing_docs)]

use std::io::Write;
use std::process::ExitCode;

use camino::Utf8PathBuf;
use clap::Parser;
use clap::error::ErrorKind;
use fsmon_core::MonitorConfig;
use fsmon_watcher::{Monitor, MonitorEvent, WatchError};
use tokio::signal::unix::{SignalKind, signal};
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

// =============================================================================
// EXIT CODES
// =============================================================================

/// Missing or invalid command-line arguments.
const EXIT_USAGE: u8 = 1;
/// Kernel event-source initialization failed.
const EXIT_INIT: u8 = 2;
/// Watch registration on a configured root failed.
const EXIT_ADD_WATCH: u8 = 3;
/// Event-source read failed or the event stream was malformed.
const EXIT_READ: u8 = 5;
/// Configuration or log-file failure.
const EXIT_CONFIG: u8 = 6;

/// Maps an engine error to the process exit code for its category.
const fn exit_code_for(error: &WatchError) -> u8 {
    match error {
        WatchError::Init(_) => EXIT_INIT,
        WatchError::Registration { .. } => EXIT_ADD_WATCH,
        WatchError::Read(_) | WatchError::Decode(_) | WatchError::ChannelClosed => EXIT_READ,
        WatchError::LogOpen { .. } | WatchError::Log(_) => EXIT_CONFIG,
    }
}

// =============================================================================
// CLI ARGUMENT TYPES
// =============================================================================

/// Recursive filesystem-change monitor.
///
/// Watches the configured directory trees and reports every change as a
/// timestamped line, both on stdout and in the configured log file.
#[derive(Parser)]
#[command(name = "fsmon", version, about, long_about = None)]
struct Cli {
    /// Path to the JSON configuration file.
    config: Utf8PathBuf,

    /// Enable verbose logging (debug level).
    #[arg(short, long)]
    verbose: bool,

    /// Disable colored output.
    #[arg(long)]
    no_color: bool,
}

// =============================================================================
// INITIALIZATION FUNCTIONS
// =============================================================================

/// Initializes the tracing subscriber for logging.
///
/// Respects the `RUST_LOG` environment variable if set. Otherwise, uses
/// `debug` level if `--verbose` is set, or `info` level by default. Noisy
/// crates are filtered to `warn` level.
///
/// # Arguments
///
/// * `verbose` - Enable debug-level logging
/// * `no_color` - Disable ANSI colors in output
fn init_tracing(verbose: bool, no_color: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = if verbose { "debug" } else { "info" };
        EnvFilter::new(format!("{level},mio=warn"))
    });

    // Check if colors should be disabled (flag or NO_COLOR env var)
    let use_ansi = !no_color && std::env::var("NO_COLOR").is_err();

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_ansi(use_ansi))
        .with(filter)
        .init();
}

// =============================================================================
// CONSUMER LOOP
// =============================================================================

/// Prints one line to stdout, ignoring a closed pipe.
fn print_line(line: &str) {
    let stdout = std::io::stdout();
    let mut handle = stdout.lock();
    let _ = writeln!(handle, "{line}");
}

/// Consumes monitor events until a signal arrives or the engine stops.
///
/// Returns `true` if the loop ended because the engine stopped on its own
/// (the shutdown result then carries the fatal error).
async fn run_consumer(monitor: &mut Monitor) -> std::io::Result<bool> {
    let mut sigterm = signal(SignalKind::terminate())?;

    let engine_stopped = loop {
        tokio::select! {
            maybe_event = monitor.recv() => match maybe_event {
                Some(MonitorEvent::Watching) => print_line("waiting for event..."),
                Some(MonitorEvent::Changed(event)) => print_line(&event.message),
                None => {
                    info!("monitor stopped on its own");
                    break true;
                }
            },
            _ = tokio::signal::ctrl_c() => {
                info!("interrupt received, shutting down");
                break false;
            }
            _ = sigterm.recv() => {
                info!("received SIGTERM, shutting down");
                break false;
            }
        }
    };

    Ok(engine_stopped)
}

// =============================================================================
// MAIN ENTRY POINT
// =============================================================================

/// Application entry point.
#[tokio::main]
async fn main() -> ExitCode {
    // 1. Install color-eyre for panic reports
    if let Err(error) = color_eyre::install() {
        eprintln!("fsmon: failed to install error reporting: {error}");
    }

    // 2. Parse CLI arguments; exit codes are owned here, not by clap
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let is_help = matches!(
                err.kind(),
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion
            );
            let _ = err.print();
            return if is_help {
                ExitCode::SUCCESS
            } else {
                ExitCode::from(EXIT_USAGE)
            };
        }
    };

    // 3. Initialize tracing (handles --no-color for log output)
    init_tracing(cli.verbose, cli.no_color);

    // 4. Load and validate the configuration
    let config = match MonitorConfig::load(&cli.config) {
        Ok(config) => config,
        Err(error) => {
            eprintln!("fsmon: configuration error: {error}");
            return ExitCode::from(EXIT_CONFIG);
        }
    };

    match &config.filtered_extension {
        Some(ext) => info!(extension = %ext, "filtering files by extension"),
        None => info!("no extensions are filtered"),
    }

    // 5. Start the engine
    let mut monitor = match Monitor::spawn(&config).await {
        Ok(monitor) => monitor,
        Err(error) => {
            eprintln!("fsmon: {error}");
            return ExitCode::from(exit_code_for(&error));
        }
    };
    info!(
        watches = monitor.watch_count(),
        log_file = %config.log_file,
        "monitoring started"
    );

    // 6. Consume events until a signal arrives or the engine dies
    let engine_stopped = match run_consumer(&mut monitor).await {
        Ok(engine_stopped) => engine_stopped,
        Err(error) => {
            eprintln!("fsmon: signal handling failed: {error}");
            false
        }
    };

    // 7. Drain: the engine flushes the log exactly once on the way out
    match monitor.shutdown().await {
        Ok(()) => {
            info!("shutdown complete");
            ExitCode::SUCCESS
        }
        Err(error) => {
            if engine_stopped {
                eprintln!("fsmon: monitor failed: {error}");
            } else {
                eprintln!("fsmon: shutdown failed: {error}");
            }
            ExitCode::from(exit_code_for(&error))
        }
    }
}
