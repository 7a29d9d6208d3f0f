//! Binary-level error types.
//!
//! Engine errors come from `pod_watch`; this adds the failures of the
//! composition root itself.

use pod_watch::WatchError;
use thiserror::Error;

/// Errors that can stop `pds`.
#[derive(Debug, Error)]
pub enum PdsError {
    /// Invalid command line / environment configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Log destination could not be set up
    #[error("Logging setup failed: {0}")]
    Logging(String),

    /// Connection, config or enumeration failure from the watch engine
    #[error("Watch error: {0}")]
    Watch(#[from] WatchError),

    /// Startup notification check failed
    #[error("Notification failed: {0}")]
    Notify(#[source] anyhow::Error),

    /// Signal handlers could not be installed
    #[error("Signal handling failed: {0}")]
    Signal(#[from] std::io::Error),
}
