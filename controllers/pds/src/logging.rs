//! Log setup: JSON records in a per-day file, mirrored to the console.

use chrono::{NaiveDate, Utc};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

use crate::error::PdsError;

/// File name prefix; the appender adds `.<YYYY-MM-DD>`.
pub const LOG_FILE_PREFIX: &str = "pds";

/// Path of the log file written on `date` (UTC).
pub fn daily_log_path(log_dir: &Path, date: NaiveDate) -> PathBuf {
    log_dir.join(format!("{}.{}", LOG_FILE_PREFIX, date.format("%Y-%m-%d")))
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Installs the global subscriber.
///
/// The returned guard flushes the file writer when dropped and must be held
/// until the process exits.
pub fn init_logging(log_dir: &Path) -> Result<WorkerGuard, PdsError> {
    std::fs::create_dir_all(log_dir)
        .map_err(|e| PdsError::Logging(format!("{}: {}", log_dir.display(), e)))?;

    let appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(LOG_FILE_PREFIX)
        .build(log_dir)
        .map_err(|e| PdsError::Logging(format!("{}: {}", log_dir.display(), e)))?;
    let (file_writer, guard) = tracing_appender::non_blocking(appender);

    let file_layer = fmt::layer()
        .json()
        .with_writer(file_writer)
        .with_filter(env_filter());
    let console_layer = fmt::layer().with_filter(env_filter());

    tracing_subscriber::registry()
        .with(file_layer)
        .with(console_layer)
        .try_init()
        .map_err(|e| PdsError::Logging(e.to_string()))?;

    info!(
        "=== start logging at {} ===",
        daily_log_path(log_dir, Utc::now().date_naive()).display()
    );
    Ok(guard)
}
