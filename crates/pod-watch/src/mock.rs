//! Mock cluster for unit testing
//!
//! This module provides an in-memory [`ClusterApi`] with scripted namespaces
//! and scripted watch streams, plus a recording handler, so the supervisor
//! and sessions can be exercised without a running cluster.

use crate::connection::{ClusterApi, EventStream};
use crate::error::WatchError;
use crate::event::{ChangeEvent, EventKind};
use crate::handler::PodHandler;
use futures::StreamExt;
use k8s_openapi::api::core::v1::Pod;
use kube::api::{ApiResource, DynamicObject};
use serde_json::json;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;

/// One scripted stream item.
#[derive(Debug, Clone)]
pub enum MockStep {
    /// Deliver an event
    Event(ChangeEvent),
    /// Deliver a stream error
    Fail(String),
}

/// Script replayed by every watch opened on a namespace.
#[derive(Debug, Clone, Default)]
pub struct MockStream {
    steps: Vec<MockStep>,
    hold_open: bool,
}

impl MockStream {
    /// Stream that closes after its steps.
    #[must_use]
    pub fn closing(steps: Vec<MockStep>) -> Self {
        Self {
            steps,
            hold_open: false,
        }
    }

    /// Stream that stays open (blocked on read) after its steps.
    #[must_use]
    pub fn held_open(steps: Vec<MockStep>) -> Self {
        Self {
            steps,
            hold_open: true,
        }
    }

    /// Stream of `count` `Added` pod events, then closes.
    #[must_use]
    pub fn pods(namespace: &str, count: usize) -> Self {
        Self::closing(
            (0..count)
                .map(|i| {
                    MockStep::Event(ChangeEvent::new(
                        EventKind::Added,
                        pod_object(namespace, &format!("pod-{i}"), "Running"),
                    ))
                })
                .collect(),
        )
    }

    fn into_stream(self) -> EventStream {
        let items = futures::stream::iter(self.steps.into_iter().map(|step| match step {
            MockStep::Event(event) => Ok(event),
            MockStep::Fail(message) => Err(WatchError::Stream(message)),
        }));
        if self.hold_open {
            items.chain(futures::stream::pending()).boxed()
        } else {
            items.boxed()
        }
    }
}

/// Mock cluster for testing
///
/// Namespaces without a script get an empty stream that closes at once.
#[derive(Clone, Default)]
pub struct MockClusterApi {
    namespaces: Arc<Mutex<Vec<String>>>,
    list_error: Arc<Mutex<Option<String>>>,
    streams: Arc<Mutex<HashMap<String, MockStream>>>,
    watches: Arc<Mutex<Vec<String>>>,
}

impl MockClusterApi {
    /// Create a mock cluster with the given namespaces
    pub fn new<S: Into<String>>(namespaces: impl IntoIterator<Item = S>) -> Self {
        let mock = Self::default();
        *mock.namespaces.lock().unwrap() = namespaces.into_iter().map(Into::into).collect();
        mock
    }

    /// Script the stream served for `namespace` (for test setup)
    pub fn set_stream(&self, namespace: &str, stream: MockStream) {
        self.streams
            .lock()
            .unwrap()
            .insert(namespace.to_string(), stream);
    }

    /// Make namespace listing fail (for test setup)
    pub fn fail_listing(&self, message: &str) {
        *self.list_error.lock().unwrap() = Some(message.to_string());
    }

    /// Namespaces of every watch opened so far, in opening order
    pub fn watches(&self) -> Vec<String> {
        self.watches.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl ClusterApi for MockClusterApi {
    async fn list_namespaces(&self) -> Result<Vec<String>, WatchError> {
        if let Some(message) = self.list_error.lock().unwrap().clone() {
            return Err(WatchError::Remote(message));
        }
        Ok(self.namespaces.lock().unwrap().clone())
    }

    async fn watch_pods(&self, namespace: &str) -> Result<EventStream, WatchError> {
        self.watches.lock().unwrap().push(namespace.to_string());
        let script = self
            .streams
            .lock()
            .unwrap()
            .get(namespace)
            .cloned()
            .unwrap_or_default();
        Ok(script.into_stream())
    }
}

/// Untyped pod payload with the given status phase.
pub fn pod_object(namespace: &str, name: &str, phase: &str) -> DynamicObject {
    DynamicObject::new(name, &ApiResource::erase::<Pod>(&()))
        .within(namespace)
        .data(json!({ "status": { "phase": phase } }))
}

/// Payload that looks like a pod but fails to decode.
pub fn undecodable_object(namespace: &str, name: &str) -> DynamicObject {
    DynamicObject::new(name, &ApiResource::erase::<Pod>(&()))
        .within(namespace)
        .data(json!({ "spec": "not-a-pod-spec" }))
}

/// Handler recording every pod it sees, optionally failing on the k-th
/// event of each namespace it watches.
#[derive(Debug, Default)]
pub struct RecordingHandler {
    seen: Mutex<Vec<(String, String)>>,
    fail_on: Option<usize>,
}

impl RecordingHandler {
    /// Handler that always succeeds
    pub fn new() -> Self {
        Self::default()
    }

    /// Handler that fails on the `call`-th event (1-based) of each session
    pub fn failing_on(call: usize) -> Self {
        Self {
            seen: Mutex::new(Vec::new()),
            fail_on: Some(call),
        }
    }

    /// (namespace, pod name) of every invocation
    pub fn seen(&self) -> Vec<(String, String)> {
        self.seen.lock().unwrap().clone()
    }

    /// Number of invocations
    pub fn calls(&self) -> usize {
        self.seen.lock().unwrap().len()
    }
}

#[async_trait::async_trait]
impl PodHandler for RecordingHandler {
    async fn handle(&self, _token: &CancellationToken, pod: Pod) -> anyhow::Result<()> {
        let namespace = pod.metadata.namespace.unwrap_or_default();
        // Calls are counted per namespace, i.e. per session of this handler
        let call = {
            let mut seen = self.seen.lock().unwrap();
            seen.push((namespace.clone(), pod.metadata.name.unwrap_or_default()));
            seen.iter().filter(|(ns, _)| *ns == namespace).count()
        };
        if self.fail_on == Some(call) {
            anyhow::bail!("rejected event #{}", call);
        }
        Ok(())
    }
}
