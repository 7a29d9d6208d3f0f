//! Change events delivered by a watch stream.

use crate::error::WatchError;
use k8s_openapi::api::core::v1::Pod;
use kube::api::DynamicObject;
use std::fmt;

/// Kind of change reported by the API server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// Object created (or listed when the watch starts)
    Added,
    /// Object updated
    Modified,
    /// Object removed
    Deleted,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self {
            Self::Added => "ADDED",
            Self::Modified => "MODIFIED",
            Self::Deleted => "DELETED",
        };
        f.write_str(kind)
    }
}

/// One undecoded event read from a watch stream.
///
/// The payload stays untyped until the session decodes it, so a malformed
/// object only costs that one event.
#[derive(Debug, Clone)]
pub struct ChangeEvent {
    /// What happened to the object
    pub kind: EventKind,
    /// Raw object as sent by the server
    pub object: DynamicObject,
}

impl ChangeEvent {
    /// Creates an event.
    #[must_use]
    pub fn new(kind: EventKind, object: DynamicObject) -> Self {
        Self { kind, object }
    }

    /// Name of the object, or `<unknown>` when the server omitted it.
    #[must_use]
    pub fn object_name(&self) -> &str {
        self.object.metadata.name.as_deref().unwrap_or("<unknown>")
    }

    /// Decodes the payload into a typed pod, consuming the event.
    pub fn decode(self) -> Result<Pod, WatchError> {
        let value = serde_json::to_value(self.object)?;
        Ok(serde_json::from_value(value)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::core::v1::Pod;
    use kube::api::ApiResource;
    use serde_json::json;

    fn pod_payload(data: serde_json::Value) -> DynamicObject {
        DynamicObject::new("web-0", &ApiResource::erase::<Pod>(&()))
            .within("default")
            .data(data)
    }

    #[test]
    fn test_decode_pod() {
        let event = ChangeEvent::new(
            EventKind::Modified,
            pod_payload(json!({ "status": { "phase": "Failed" } })),
        );
        assert_eq!(event.object_name(), "web-0");

        let pod = event.decode().expect("pod should decode");
        assert_eq!(pod.metadata.name.as_deref(), Some("web-0"));
        assert_eq!(pod.metadata.namespace.as_deref(), Some("default"));
        let phase = pod.status.and_then(|s| s.phase);
        assert_eq!(phase.as_deref(), Some("Failed"));
    }

    #[test]
    fn test_decode_rejects_malformed_spec() {
        let event = ChangeEvent::new(
            EventKind::Added,
            pod_payload(json!({ "spec": "not-a-pod-spec" })),
        );
        assert!(matches!(event.decode(), Err(WatchError::Decode(_))));
    }

    #[test]
    fn test_event_kind_display() {
        assert_eq!(EventKind::Added.to_string(), "ADDED");
        assert_eq!(EventKind::Modified.to_string(), "MODIFIED");
        assert_eq!(EventKind::Deleted.to_string(), "DELETED");
    }
}
