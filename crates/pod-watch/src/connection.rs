//! Shared cluster connection.
//!
//! [`ClusterApi`] abstracts the two remote calls the engine needs so the
//! sessions can be driven by a mock in tests. [`ConnectionProvider`] builds
//! the handle once and hands out clones of the same `Arc` afterwards.

use crate::error::WatchError;
use crate::event::ChangeEvent;
use futures::stream::BoxStream;
use std::fmt;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::info;

/// Stream of change events for one watch.
pub type EventStream = BoxStream<'static, Result<ChangeEvent, WatchError>>;

/// Remote operations used by the watch engine.
///
/// All async methods must be `Send` to work with Tokio's work-stealing runtime.
#[async_trait::async_trait]
pub trait ClusterApi: Send + Sync {
    /// Lists the names of every namespace visible right now.
    async fn list_namespaces(&self) -> Result<Vec<String>, WatchError>;

    /// Opens a new, independent watch over the pods of `namespace`.
    async fn watch_pods(&self, namespace: &str) -> Result<EventStream, WatchError>;
}

/// Builds a cluster connection.
#[async_trait::async_trait]
pub trait ConnectionFactory: Send + Sync {
    /// Performs the (possibly remote) construction.
    async fn connect(&self) -> Result<Arc<dyn ClusterApi>, WatchError>;
}

/// Memoized connection: the factory runs at most once, even when many
/// callers ask for the connection concurrently.
pub struct ConnectionProvider {
    factory: Box<dyn ConnectionFactory>,
    connection: OnceCell<Arc<dyn ClusterApi>>,
}

impl ConnectionProvider {
    /// Creates a provider that has not connected yet.
    pub fn new(factory: impl ConnectionFactory + 'static) -> Self {
        Self {
            factory: Box::new(factory),
            connection: OnceCell::new(),
        }
    }

    /// Returns the shared connection, constructing it on first use.
    ///
    /// Concurrent first callers wait on the same construction. A failed
    /// construction is returned as is and nothing is cached.
    pub async fn get_connection(&self) -> Result<Arc<dyn ClusterApi>, WatchError> {
        let connection = self
            .connection
            .get_or_try_init(|| async {
                info!("Connecting to Kubernetes API server");
                self.factory.connect().await
            })
            .await?;
        Ok(Arc::clone(connection))
    }

    /// True once a connection has been built.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.connection.initialized()
    }
}

impl fmt::Debug for ConnectionProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionProvider")
            .field("connected", &self.is_connected())
            .finish_non_exhaustive()
    }
}
