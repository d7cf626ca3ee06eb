//! Process-wide log sink.
//!
//! Logs go to an append-only file and, unless disabled, to stderr. The
//! filter is taken from `COUCHTATO_LOG`, then `RUST_LOG`, then the
//! configured default directive.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use thiserror::Error;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;

/// Project-specific filter variable.
pub const LOG_ENV: &str = "COUCHTATO_LOG";

/// Logging setup errors.
#[derive(Debug, Error)]
pub enum LoggingError {
    /// The log file could not be opened for appending.
    #[error("cannot open log file {}: {source}", path.display())]
    OpenFile {
        /// Path of the log file.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
}

/// Where logs go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    /// Append-only log file; none disables file logging.
    pub file: Option<PathBuf>,
    /// Also log to stderr.
    pub stderr: bool,
    /// Filter used when no environment override is set.
    pub default_directive: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            file: Some(PathBuf::from("couchtato.log")),
            stderr: true,
            default_directive: "info".to_string(),
        }
    }
}

/// Opens `path` for appending, creating it when missing.
///
/// # Errors
///
/// Returns `LoggingError::OpenFile` on I/O failure.
pub fn open_log_file(path: &Path) -> Result<File, LoggingError> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|source| LoggingError::OpenFile {
            path: path.to_path_buf(),
            source,
        })
}

/// Installs the global subscriber.
///
/// Returns `Ok(true)` when installed and `Ok(false)` when a subscriber was
/// already set for this process, in which case nothing changes.
///
/// # Errors
///
/// Returns `LoggingError::OpenFile` if the log file cannot be opened.
pub fn init(config: &LogConfig) -> Result<bool, LoggingError> {
    let file_layer = match &config.file {
        Some(path) => Some(
            fmt::layer()
                .with_writer(Mutex::new(open_log_file(path)?))
                .with_ansi(false)
                .with_target(true),
        ),
        None => None,
    };

    let stderr_layer = config.stderr.then(|| {
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .compact()
    });

    let installed = tracing_subscriber::registry()
        .with(build_env_filter(&config.default_directive))
        .with(file_layer)
        .with(stderr_layer)
        .try_init()
        .is_ok();

    Ok(installed)
}

/// `COUCHTATO_LOG` > `RUST_LOG` > `default_directive`.
fn build_env_filter(default_directive: &str) -> EnvFilter {
    if let Ok(directives) = std::env::var(LOG_ENV)
        && let Ok(filter) = EnvFilter::try_new(&directives)
    {
        return filter;
    }

    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return filter;
    }

    EnvFilter::try_new(default_directive).unwrap_or_else(|_| EnvFilter::new("info"))
}
