//! A single watch session: one stream for one (namespace, callback) pair.

use crate::connection::ClusterApi;
use crate::error::WatchError;
use crate::handler::SharedHandler;
use futures::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Why a session stopped without error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// The server closed the stream (watch timeout, expired resource version)
    StreamClosed,
    /// The shared token was cancelled
    Cancelled,
}

/// Summary of a session that stopped without error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionReport {
    /// How the session ended
    pub end: SessionEnd,
    /// Events handed to the callback
    pub processed: usize,
    /// Events dropped because they did not decode
    pub skipped: usize,
}

impl SessionReport {
    fn new(end: SessionEnd) -> Self {
        Self {
            end,
            processed: 0,
            skipped: 0,
        }
    }
}

/// Watches the pods of one namespace on behalf of one callback.
///
/// Events are handled strictly one at a time in arrival order. There is no
/// reconnection: once the stream ends, so does the session.
#[derive(Clone)]
pub struct WatchSession {
    namespace: String,
    index: usize,
    handler: SharedHandler,
}

impl WatchSession {
    /// Creates a session for callback number `index`.
    pub fn new(namespace: impl Into<String>, index: usize, handler: SharedHandler) -> Self {
        Self {
            namespace: namespace.into(),
            index,
            handler,
        }
    }

    /// Namespace being watched.
    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Position of the callback in the supervisor's list.
    #[must_use]
    pub fn index(&self) -> usize {
        self.index
    }

    /// Opens the stream and feeds the callback until the stream closes, the
    /// token is cancelled or the callback fails.
    ///
    /// Cancellation also interrupts a callback in progress; that event is not
    /// counted as processed.
    pub async fn run(
        &self,
        api: &dyn ClusterApi,
        token: &CancellationToken,
    ) -> Result<SessionReport, WatchError> {
        let mut stream = tokio::select! {
            biased;
            () = token.cancelled() => return Ok(SessionReport::new(SessionEnd::Cancelled)),
            opened = api.watch_pods(&self.namespace) => opened?,
        };

        let mut report = SessionReport::new(SessionEnd::StreamClosed);
        loop {
            let next = tokio::select! {
                biased;
                () = token.cancelled() => {
                    report.end = SessionEnd::Cancelled;
                    return Ok(report);
                }
                next = stream.next() => next,
            };

            let Some(event) = next else {
                return Ok(report);
            };
            let event = event?;

            let kind = event.kind;
            let name = event.object_name().to_string();
            let pod = match event.decode() {
                Ok(pod) => pod,
                Err(e) => {
                    warn!(
                        "Skipping undecodable {} event for {}/{}: {}",
                        kind, self.namespace, name, e
                    );
                    report.skipped += 1;
                    continue;
                }
            };

            debug!("{} pod {}/{} -> callback[{}]", kind, self.namespace, name, self.index);
            let handled = tokio::select! {
                biased;
                () = token.cancelled() => {
                    report.end = SessionEnd::Cancelled;
                    return Ok(report);
                }
                handled = self.handler.handle(token, pod) => handled,
            };
            handled.map_err(|source| WatchError::Callback {
                index: self.index,
                namespace: self.namespace.clone(),
                source,
            })?;
            report.processed += 1;
        }
    }
}

impl std::fmt::Debug for WatchSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatchSession")
            .field("namespace", &self.namespace)
            .field("index", &self.index)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::EventStream;
    use crate::event::{ChangeEvent, EventKind};
    use crate::handler::handler_fn;
    use k8s_openapi::api::core::v1::Pod;
    use kube::api::{ApiResource, DynamicObject};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    /// Serves the same fixed stream for every watch.
    struct FixedStream {
        items: Mutex<Option<Vec<Result<ChangeEvent, WatchError>>>>,
        hold_open: bool,
    }

    impl FixedStream {
        fn new(items: Vec<Result<ChangeEvent, WatchError>>, hold_open: bool) -> Self {
            Self {
                items: Mutex::new(Some(items)),
                hold_open,
            }
        }
    }

    #[async_trait::async_trait]
    impl ClusterApi for FixedStream {
        async fn list_namespaces(&self) -> Result<Vec<String>, WatchError> {
            Ok(vec!["default".to_string()])
        }

        async fn watch_pods(&self, _namespace: &str) -> Result<EventStream, WatchError> {
            let items = self.items.lock().unwrap().take().unwrap_or_default();
            let events = futures::stream::iter(items);
            if self.hold_open {
                Ok(events.chain(futures::stream::pending()).boxed())
            } else {
                Ok(events.boxed())
            }
        }
    }

    fn pod(name: &str, data: serde_json::Value) -> Result<ChangeEvent, WatchError> {
        let object = DynamicObject::new(name, &ApiResource::erase::<Pod>(&()))
            .within("default")
            .data(data);
        Ok(ChangeEvent::new(EventKind::Added, object))
    }

    fn counting_handler(calls: &Arc<AtomicUsize>) -> SharedHandler {
        let calls = Arc::clone(calls);
        Arc::new(handler_fn(move |_token, _pod| {
            let calls = Arc::clone(&calls);
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        }))
    }

    #[tokio::test]
    async fn test_runs_until_stream_closes() {
        let api = FixedStream::new(
            vec![
                pod("a", serde_json::json!({})),
                pod("b", serde_json::json!({})),
            ],
            false,
        );
        let calls = Arc::new(AtomicUsize::new(0));
        let session = WatchSession::new("default", 0, counting_handler(&calls));

        let report = session.run(&api, &CancellationToken::new()).await.unwrap();
        assert_eq!(report.end, SessionEnd::StreamClosed);
        assert_eq!(report.processed, 2);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_undecodable_event_is_skipped() {
        let api = FixedStream::new(
            vec![
                pod("good-1", serde_json::json!({})),
                pod("bad", serde_json::json!({ "spec": 42 })),
                pod("good-2", serde_json::json!({})),
            ],
            false,
        );
        let calls = Arc::new(AtomicUsize::new(0));
        let session = WatchSession::new("default", 0, counting_handler(&calls));

        let report = session.run(&api, &CancellationToken::new()).await.unwrap();
        assert_eq!(report.processed, 2);
        assert_eq!(report.skipped, 1);
    }

    #[tokio::test]
    async fn test_stream_error_ends_session() {
        let api = FixedStream::new(
            vec![
                pod("a", serde_json::json!({})),
                Err(WatchError::Stream("connection reset".to_string())),
                pod("never", serde_json::json!({})),
            ],
            false,
        );
        let calls = Arc::new(AtomicUsize::new(0));
        let session = WatchSession::new("default", 0, counting_handler(&calls));

        let err = session.run(&api, &CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, WatchError::Stream(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_callback_error_stops_without_draining() {
        let api = FixedStream::new(
            (0..5).map(|i| pod(&format!("p{i}"), serde_json::json!({}))).collect(),
            false,
        );
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&calls);
        let handler: SharedHandler = Arc::new(handler_fn(move |_token, _pod| {
            let seen = Arc::clone(&seen);
            async move {
                if seen.fetch_add(1, Ordering::SeqCst) + 1 == 2 {
                    anyhow::bail!("second event rejected");
                }
                Ok(())
            }
        }));
        let session = WatchSession::new("default", 3, handler);

        let err = session.run(&api, &CancellationToken::new()).await.unwrap_err();
        match err {
            WatchError::Callback {
                index, namespace, ..
            } => {
                assert_eq!(index, 3);
                assert_eq!(namespace, "default");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_cancel_while_blocked_on_read() {
        let api = FixedStream::new(vec![pod("a", serde_json::json!({}))], true);
        let calls = Arc::new(AtomicUsize::new(0));
        let session = WatchSession::new("default", 0, counting_handler(&calls));
        let token = CancellationToken::new();

        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            canceller.cancel();
        });

        let report = tokio::time::timeout(Duration::from_secs(1), session.run(&api, &token))
            .await
            .expect("session should observe cancellation")
            .unwrap();
        assert_eq!(report.end, SessionEnd::Cancelled);
        assert_eq!(report.processed, 1);
    }

    #[tokio::test]
    async fn test_cancel_interrupts_callback_ignoring_token() {
        let api = FixedStream::new(
            vec![
                pod("stuck", serde_json::json!({})),
                pod("never", serde_json::json!({})),
            ],
            false,
        );
        let calls = Arc::new(AtomicUsize::new(0));
        let entered = Arc::clone(&calls);
        let handler: SharedHandler = Arc::new(handler_fn(move |_token, _pod| {
            let entered = Arc::clone(&entered);
            async move {
                entered.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(())
            }
        }));
        let session = WatchSession::new("default", 0, handler);
        let token = CancellationToken::new();

        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            canceller.cancel();
        });

        let report = tokio::time::timeout(Duration::from_secs(1), session.run(&api, &token))
            .await
            .expect("cancellation should interrupt the callback")
            .unwrap();
        assert_eq!(report.end, SessionEnd::Cancelled);
        assert_eq!(report.processed, 0);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_cancelled_before_open() {
        let api = FixedStream::new(Vec::new(), true);
        let calls = Arc::new(AtomicUsize::new(0));
        let session = WatchSession::new("default", 0, counting_handler(&calls));
        let token = CancellationToken::new();
        token.cancel();

        let report = session.run(&api, &token).await.unwrap();
        assert_eq!(report.end, SessionEnd::Cancelled);
        assert_eq!(report.processed, 0);
    }
}
