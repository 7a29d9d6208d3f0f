//! Fan-out supervisor.
//!
//! Spawns one task per (namespace, callback) pair over a namespace snapshot
//! taken once at startup, and joins them through a [`CompletionLatch`].
//! The supervisor never cancels anything itself: it only hands the caller's
//! token to every session.

use crate::connection::ClusterApi;
use crate::error::WatchError;
use crate::handler::SharedHandler;
use crate::latch::{CompletionGuard, CompletionLatch, Progress};
use crate::namespaces::list_namespaces;
use crate::session::{SessionEnd, WatchSession};
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, info_span, Instrument};

/// Everything one spawned task needs, moved into the task by value.
struct WatchTask {
    session: WatchSession,
    api: Arc<dyn ClusterApi>,
    token: CancellationToken,
    done: CompletionGuard,
}

impl WatchTask {
    async fn run(self) {
        let WatchTask {
            session,
            api,
            token,
            done,
        } = self;
        let namespace = session.namespace();

        info!("start watching {}", namespace);
        let outcome = AssertUnwindSafe(session.run(api.as_ref(), &token))
            .catch_unwind()
            .await;
        match outcome {
            Ok(Ok(report)) => {
                let reason = match report.end {
                    SessionEnd::StreamClosed => "stream closed",
                    SessionEnd::Cancelled => "cancelled",
                };
                info!(
                    "Session {}[{}] ended ({}): {} events handled, {} skipped",
                    namespace,
                    session.index(),
                    reason,
                    report.processed,
                    report.skipped
                );
            }
            Ok(Err(e)) => {
                error!(
                    namespace = %namespace,
                    callback = session.index(),
                    "error while watching {}: {}",
                    namespace,
                    e
                );
            }
            Err(panic) => {
                error!(
                    namespace = %namespace,
                    callback = session.index(),
                    "callback panicked while watching {}: {}",
                    namespace,
                    panic_message(panic.as_ref())
                );
            }
        }
        info!("stop watching {}", namespace);

        drop(done);
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message
    } else {
        "unknown panic"
    }
}

/// Runs and joins the watch sessions of one process.
pub struct Supervisor {
    api: Arc<dyn ClusterApi>,
    latch: CompletionLatch,
}

impl Supervisor {
    /// Creates a supervisor over an already built connection.
    pub fn new(api: Arc<dyn ClusterApi>) -> Self {
        Self {
            api,
            latch: CompletionLatch::new(),
        }
    }

    /// Enumerates namespaces once and spawns a session for every
    /// (namespace, handler) pair. Returns how many sessions were spawned.
    ///
    /// Only the enumeration can fail here. Session failures are logged by
    /// the session's task and never reach the caller.
    pub async fn start_all(
        &self,
        token: &CancellationToken,
        handlers: &[SharedHandler],
    ) -> Result<usize, WatchError> {
        let namespaces = list_namespaces(self.api.as_ref()).await?;

        let mut spawned = 0;
        for namespace in namespaces.iter() {
            // Each handler gets its own stream, even for the same namespace
            for (index, handler) in handlers.iter().enumerate() {
                let task = WatchTask {
                    session: WatchSession::new(namespace, index, Arc::clone(handler)),
                    api: Arc::clone(&self.api),
                    token: token.clone(),
                    done: self.latch.arm(),
                };
                let span = info_span!("watch_session", namespace = %namespace, callback = index);
                tokio::spawn(task.run().instrument(span));
                spawned += 1;
            }
        }

        info!(
            "Watching {} namespaces with {} callbacks ({} sessions)",
            namespaces.len(),
            handlers.len(),
            spawned
        );
        Ok(spawned)
    }

    /// Blocks until every spawned session has finished.
    pub async fn wait(&self) {
        self.latch.wait().await;
    }

    /// Launched and completed session counts.
    #[must_use]
    pub fn progress(&self) -> Progress {
        self.latch.progress()
    }
}

impl std::fmt::Debug for Supervisor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Supervisor")
            .field("progress", &self.progress())
            .finish_non_exhaustive()
    }
}
