//! Logging for the Trove binary.
//!
//! The console (stderr, so command output on stdout stays clean) shows what
//! the operator asked for; a file in the logs directory receives every event
//! of the current run at TRACE level.

use std::fs::{File, create_dir_all};
use std::path::{Path, PathBuf};

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, fmt};

use crate::TroveError;

/// File name of the per-run log, overwritten on every start.
pub const LAST_RUN_LOG: &str = "trove-last-run.log";

/// Crates whose chatter is capped on the console unless `RUST_LOG` says
/// otherwise.
const NOISY_TARGETS: &[&str] = &["hyper=warn", "hyper_util=warn", "reqwest=warn", "h2=warn"];

/// Path of the per-run log inside `logs_dir` (default `./logs`).
pub fn log_file_path(logs_dir: Option<&Path>) -> PathBuf {
    logs_dir.unwrap_or_else(|| Path::new("logs")).join(LAST_RUN_LOG)
}

/// Installs the console and file layers as the global subscriber.
///
/// The console filter comes from `RUST_LOG` when set, otherwise from
/// `console_level`.
///
/// # Errors
/// - `TroveError::Io` - Logs directory or log file could not be created
/// - `TroveError::Configuration` - A global subscriber is already installed
pub fn init_tracing(console_level: Level, logs_dir: Option<&Path>) -> crate::Result<PathBuf> {
    let log_file_path = log_file_path(logs_dir);
    if let Some(parent) = log_file_path.parent() {
        create_dir_all(parent)?;
    }
    let log_file = File::create(&log_file_path)?;

    let console_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(console_directives(console_level)));

    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .with_filter(console_filter);

    let file_layer = fmt::layer()
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .with_ansi(false)
        .with_writer(std::sync::Mutex::new(log_file))
        .with_filter(EnvFilter::new("trace"));

    tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| TroveError::Configuration {
            reason: format!("tracing already initialized: {e}"),
        })?;

    tracing::info!(
        console = %console_level,
        log_file = %log_file_path.display(),
        "Tracing initialized"
    );

    Ok(log_file_path)
}

fn console_directives(level: Level) -> String {
    let mut directives = vec![level.to_string().to_lowercase()];
    directives.extend(NOISY_TARGETS.iter().map(|target| target.to_string()));
    directives.join(",")
}

/// Log levels accepted by `--log-level`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum CliLogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl CliLogLevel {
    pub fn as_tracing_level(self) -> Level {
        match self {
            CliLogLevel::Error => Level::ERROR,
            CliLogLevel::Warn => Level::WARN,
            CliLogLevel::Info => Level::INFO,
            CliLogLevel::Debug => Level::DEBUG,
            CliLogLevel::Trace => Level::TRACE,
        }
    }
}

impl std::fmt::Display for CliLogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            CliLogLevel::Error => "error",
            CliLogLevel::Warn => "warn",
            CliLogLevel::Info => "info",
            CliLogLevel::Debug => "debug",
            CliLogLevel::Trace => "trace",
        };
        f.write_str(name)
    }
}
