//! One-shot namespace enumeration.
//!
//! The snapshot is taken once at startup. Namespaces created afterwards are
//! not watched.

use crate::connection::ClusterApi;
use crate::error::WatchError;
use tracing::info;

/// Immutable, sorted and de-duplicated set of namespace names.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NamespaceSnapshot {
    names: Vec<String>,
}

impl NamespaceSnapshot {
    /// Normalizes `names` into a snapshot.
    #[must_use]
    pub fn new(mut names: Vec<String>) -> Self {
        names.sort_unstable();
        names.dedup();
        Self { names }
    }

    /// Number of namespaces.
    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// True when the cluster reported no namespace.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// True when `namespace` is part of the snapshot.
    #[must_use]
    pub fn contains(&self, namespace: &str) -> bool {
        self.names
            .binary_search_by(|name| name.as_str().cmp(namespace))
            .is_ok()
    }

    /// Namespace names in sorted order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }
}

/// Lists every namespace visible at call time.
///
/// Failure is fatal to the run: watching a partial set would silently miss
/// pods.
pub async fn list_namespaces(api: &dyn ClusterApi) -> Result<NamespaceSnapshot, WatchError> {
    let snapshot = NamespaceSnapshot::new(api.list_namespaces().await?);
    info!("Found {} namespaces", snapshot.len());
    Ok(snapshot)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| (*v).to_string()).collect()
    }

    #[test]
    fn test_snapshot_ignores_order_and_duplicates() {
        let a = NamespaceSnapshot::new(names(&["kube-system", "default", "default"]));
        let b = NamespaceSnapshot::new(names(&["default", "kube-system"]));
        assert_eq!(a, b);
        assert_eq!(a.len(), 2);
        assert_eq!(a.iter().collect::<Vec<_>>(), vec!["default", "kube-system"]);
    }

    #[test]
    fn test_snapshot_contains() {
        let snapshot = NamespaceSnapshot::new(names(&["monitoring", "apps"]));
        assert!(snapshot.contains("apps"));
        assert!(!snapshot.contains("default"));
    }

    #[test]
    fn test_empty_snapshot() {
        let snapshot = NamespaceSnapshot::new(Vec::new());
        assert!(snapshot.is_empty());
        assert_eq!(snapshot.iter().count(), 0);
    }
}
