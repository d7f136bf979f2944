//! Tracing setup for the `statlink` binary.
//!
//! Events go to stderr, keeping stdout for results, and to a daily log file
//! under `<app dir>/logs`. The appender keeps the ten newest files.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use time::UtcOffset;
use time::format_description::BorrowedFormatItem;
use time::macros::format_description;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{InitError, RollingFileAppender, Rotation};
use tracing_subscriber::fmt::time::OffsetTime;
use tracing_subscriber::{EnvFilter, Registry, fmt, prelude::*};

use crate::app_dirs::{self, AppDirError};

const MAX_LOG_FILES: usize = 10;
const LOG_FILE_PREFIX: &str = "statlink";
const LOG_FILE_SUFFIX: &str = "log";
const TIMESTAMP_FORMAT: &[BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");

static LOG_GUARD: OnceLock<WorkerGuard> = OnceLock::new();
static LOG_DIR: OnceLock<PathBuf> = OnceLock::new();

#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error("Log directory unavailable: {0}")]
    Dir(#[from] AppDirError),
    #[error("Failed to open log file in {path}: {source}")]
    Appender { path: PathBuf, source: InitError },
    #[error("A global tracing subscriber is already installed: {0}")]
    SetGlobal(#[from] tracing::subscriber::SetGlobalDefaultError),
}

/// Install the global subscriber, logging into the app's `logs` directory.
///
/// Returns the log directory. Later calls return the first directory without
/// touching the subscriber.
pub fn init() -> Result<PathBuf, LoggingError> {
    if let Some(dir) = LOG_DIR.get() {
        return Ok(dir.clone());
    }
    init_in(&app_dirs::logs_dir()?)
}

/// Like [`init`], with log files written into `log_dir`.
pub fn init_in(log_dir: &Path) -> Result<PathBuf, LoggingError> {
    if let Some(dir) = LOG_DIR.get() {
        return Ok(dir.clone());
    }
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender(log_dir)?);
    let timer = OffsetTime::new(
        UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC),
        TIMESTAMP_FORMAT,
    );
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = Registry::default()
        .with(filter)
        .with(fmt::layer().with_timer(timer.clone()).with_writer(std::io::stderr))
        .with(fmt::layer().with_ansi(false).with_timer(timer).with_writer(file_writer));
    tracing::subscriber::set_global_default(subscriber)?;
    let _ = LOG_GUARD.set(guard);
    let dir = LOG_DIR.get_or_init(|| log_dir.to_path_buf()).clone();
    tracing::info!("Logging to {}", dir.display());
    Ok(dir)
}

/// Daily `statlink.<date>.log` files; older ones beyond the limit are pruned on open.
fn file_appender(log_dir: &Path) -> Result<RollingFileAppender, LoggingError> {
    RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(LOG_FILE_PREFIX)
        .filename_suffix(LOG_FILE_SUFFIX)
        .max_log_files(MAX_LOG_FILES)
        .build(log_dir)
        .map_err(|source| LoggingError::Appender {
            path: log_dir.to_path_buf(),
            source,
        })
}
