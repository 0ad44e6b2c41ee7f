//! Tracing setup for Kinetic
//!
//! Console output at the level the user picked, plus a full trace of the last
//! run on disk so a failed readiness cycle can be inspected afterwards.

use std::fs::{File, create_dir_all};
use std::path::{Path, PathBuf};

use tracing::{Level, Subscriber};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, fmt};

/// File name of the per-run trace log, overwritten on every start.
pub const LAST_RUN_LOG: &str = "kinetic-last-run.log";

#[derive(Debug, thiserror::Error)]
pub enum TracingSetupError {
    #[error("Cannot prepare log file {path}: {source}")]
    LogFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("A global tracing subscriber is already installed")]
    AlreadyInstalled,
}

/// Installs the console and file layers as the global subscriber.
///
/// `RUST_LOG` overrides `console_level` for the console layer only. The file
/// layer always records everything at trace level into
/// `<logs_dir>/kinetic-last-run.log` (`logs/` when `logs_dir` is `None`).
///
/// When the log file cannot be prepared, console logging is still installed,
/// a warning is emitted through it and `Ok(None)` is returned.
///
/// # Errors
///
/// - `TracingSetupError::AlreadyInstalled` - If called twice in one process
pub fn init_tracing(
    console_level: Level,
    logs_dir: Option<&Path>,
) -> Result<Option<PathBuf>, TracingSetupError> {
    let (log_file, log_file_path) =
        match open_log_file(logs_dir.unwrap_or_else(|| Path::new("logs"))) {
            Ok(opened) => opened,
            Err(error) => {
                tracing_subscriber::registry()
                    .with(console_layer(console_level))
                    .try_init()
                    .map_err(|_| TracingSetupError::AlreadyInstalled)?;
                tracing::warn!("File logging disabled: {error}");
                return Ok(None);
            }
        };

    let file_layer = fmt::layer()
        .with_target(true)
        .with_thread_names(true)
        .with_file(true)
        .with_line_number(true)
        .with_ansi(false)
        .with_writer(std::sync::Mutex::new(log_file))
        .with_filter(EnvFilter::new("trace"));

    tracing_subscriber::registry()
        .with(console_layer(console_level))
        .with(file_layer)
        .try_init()
        .map_err(|_| TracingSetupError::AlreadyInstalled)?;

    tracing::debug!(
        "Tracing initialized: console={}, trace_file={}",
        console_level,
        log_file_path.display()
    );

    Ok(Some(log_file_path))
}

fn console_layer<S>(console_level: Level) -> impl Layer<S>
where
    S: Subscriber + for<'span> LookupSpan<'span>,
{
    let console_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(console_level.to_string()));

    fmt::layer()
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .with_writer(std::io::stderr)
        .with_filter(console_filter)
}

/// Creates `logs_dir` if needed and truncates the last-run log inside it.
fn open_log_file(logs_dir: &Path) -> Result<(File, PathBuf), TracingSetupError> {
    let path = logs_dir.join(LAST_RUN_LOG);
    let file = create_dir_all(logs_dir)
        .and_then(|()| File::create(&path))
        .map_err(|source| TracingSetupError::LogFile {
            path: path.clone(),
            source,
        })?;
    Ok((file, path))
}

/// Console verbosity selectable from the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum CliLogLevel {
    Error,
    #[default]
    Warn,
    Info,
    Debug,
    Trace,
}

impl CliLogLevel {
    /// Converts to the matching `tracing` level.
    ///
    /// ```
    /// use kinetic_core::tracing_setup::CliLogLevel;
    ///
    /// assert_eq!(CliLogLevel::Debug.as_tracing_level(), tracing::Level::DEBUG);
    /// ```
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

impl std::str::FromStr for CliLogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        <Self as clap::ValueEnum>::from_str(s.trim(), true)
            .map_err(|_| format!("Invalid log level: {s}"))
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
