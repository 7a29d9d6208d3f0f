//! Watch engine errors
//!
//! Startup failures (config, connection, enumeration) are fatal to the run.
//! Stream and callback failures are scoped to a single session.

use thiserror::Error;

/// Errors that can occur while connecting to the cluster or watching pods
#[derive(Debug, Error)]
pub enum WatchError {
    /// Kubeconfig (or in-cluster config) is unreadable or malformed
    #[error("Invalid cluster configuration: {0}")]
    Config(String),

    /// Client construction or API server handshake failed
    #[error("Connection error: {0}")]
    Connection(String),

    /// A remote call (e.g. namespace listing) failed
    #[error("Kubernetes API error: {0}")]
    Remote(String),

    /// The watch stream failed or the server sent an error event
    #[error("Watch stream error: {0}")]
    Stream(String),

    /// An event payload could not be decoded into a pod
    #[error("Decode error: {0}")]
    Decode(#[from] serde_json::Error),

    /// A callback returned an error for an event
    #[error("callback[{index}] failed in namespace {namespace}: {source}")]
    Callback {
        /// Position of the callback in the list given to the supervisor
        index: usize,
        /// Namespace the failing session was watching
        namespace: String,
        /// Error returned by the callback
        #[source]
        source: anyhow::Error,
    },
}

impl WatchError {
    /// True for errors that must abort the whole run.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Config(_) | Self::Connection(_) | Self::Remote(_))
    }
}
