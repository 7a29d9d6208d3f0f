//! Kubernetes implementation of the cluster connection.

use crate::connection::{ClusterApi, ConnectionFactory, EventStream};
use crate::error::WatchError;
use crate::event::{ChangeEvent, EventKind};
use futures::{future, StreamExt};
use k8s_openapi::api::core::v1::Namespace;
use kube::api::{Api, DynamicObject, ListParams, WatchEvent};
use kube::config::{Config, KubeConfigOptions, Kubeconfig};
use kube::Client;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

/// Resource version sent when opening a watch ("any version").
const WATCH_FROM_ANY_VERSION: &str = "0";

/// Builds the pod watch request for `namespace`.
///
/// `WatchParams` always adds `timeoutSeconds` (290 by default). This query has
/// none, so the server keeps the stream open until the session is cancelled.
pub(crate) fn watch_request(namespace: &str) -> Result<http::Request<Vec<u8>>, WatchError> {
    let uri = format!(
        "/api/v1/namespaces/{}/pods?watch=true&allowWatchBookmarks=true&resourceVersion={}",
        namespace, WATCH_FROM_ANY_VERSION
    );
    http::Request::get(uri).body(Vec::new()).map_err(|e| {
        WatchError::Stream(format!("Invalid watch request for {}: {}", namespace, e))
    })
}

/// Pod watching and namespace listing backed by a `kube::Client`.
#[derive(Clone)]
pub struct KubeClusterApi {
    client: Client,
}

impl KubeClusterApi {
    /// Wraps an existing client.
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait::async_trait]
impl ClusterApi for KubeClusterApi {
    async fn list_namespaces(&self) -> Result<Vec<String>, WatchError> {
        let api: Api<Namespace> = Api::all(self.client.clone());
        let list = api
            .list(&ListParams::default())
            .await
            .map_err(|e| WatchError::Remote(format!("Failed to list namespaces: {}", e)))?;

        Ok(list
            .items
            .into_iter()
            .filter_map(|namespace| namespace.metadata.name)
            .collect())
    }

    async fn watch_pods(&self, namespace: &str) -> Result<EventStream, WatchError> {
        // Pods are watched untyped so that a bad payload fails one event,
        // not the whole stream.
        let request = watch_request(namespace)?;
        let events = self
            .client
            .request_events::<DynamicObject>(request)
            .await
            .map_err(|e| {
                WatchError::Stream(format!("Failed to watch pods in {}: {}", namespace, e))
            })?;

        Ok(events
            .filter_map(|item| future::ready(translate(item)))
            .boxed())
    }
}

/// Maps a raw watch item to an engine event. Bookmarks carry no object.
fn translate(
    item: Result<WatchEvent<DynamicObject>, kube::Error>,
) -> Option<Result<ChangeEvent, WatchError>> {
    match item {
        Ok(WatchEvent::Added(object)) => Some(Ok(ChangeEvent::new(EventKind::Added, object))),
        Ok(WatchEvent::Modified(object)) => {
            Some(Ok(ChangeEvent::new(EventKind::Modified, object)))
        }
        Ok(WatchEvent::Deleted(object)) => Some(Ok(ChangeEvent::new(EventKind::Deleted, object))),
        Ok(WatchEvent::Bookmark(_)) => {
            debug!("Ignoring watch bookmark");
            None
        }
        Ok(WatchEvent::Error(status)) => Some(Err(WatchError::Stream(format!(
            "Server sent watch error: {:?}",
            status
        )))),
        Err(e) => Some(Err(WatchError::Stream(e.to_string()))),
    }
}

/// Where the client configuration comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KubeconfigSource {
    /// A kubeconfig file
    File(PathBuf),
    /// The pod's service account
    InCluster,
}

impl KubeconfigSource {
    /// Uses `path` when given, else `~/.kube/config`, else in-cluster config
    /// when there is no home directory.
    #[must_use]
    pub fn from_path_or_default(path: Option<PathBuf>) -> Self {
        match path.or_else(default_kubeconfig_path) {
            Some(path) => Self::File(path),
            None => Self::InCluster,
        }
    }
}

/// `~/.kube/config` for the invoking user.
#[must_use]
pub fn default_kubeconfig_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".kube").join("config"))
}

/// Builds a [`KubeClusterApi`] and verifies the API server answers.
#[derive(Debug, Clone)]
pub struct KubeConnectionFactory {
    source: KubeconfigSource,
}

impl KubeConnectionFactory {
    /// Creates a factory reading configuration from `source`.
    #[must_use]
    pub fn new(source: KubeconfigSource) -> Self {
        Self { source }
    }

    /// Loads the client configuration without contacting the cluster.
    ///
    /// The read timeout is lifted: a quiet namespace may send nothing for
    /// hours and its watch must not be dropped for it.
    pub async fn load_config(&self) -> Result<Config, WatchError> {
        let mut config = match &self.source {
            KubeconfigSource::File(path) => {
                debug!("Reading kubeconfig from {}", path.display());
                let kubeconfig = Kubeconfig::read_from(path).map_err(|e| {
                    WatchError::Config(format!("Failed to read {}: {}", path.display(), e))
                })?;
                Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
                    .await
                    .map_err(|e| {
                        WatchError::Config(format!("Failed to load {}: {}", path.display(), e))
                    })?
            }
            KubeconfigSource::InCluster => Config::incluster()
                .map_err(|e| WatchError::Config(format!("In-cluster configuration: {}", e)))?,
        };
        config.read_timeout = None;
        Ok(config)
    }
}

#[async_trait::async_trait]
impl ConnectionFactory for KubeConnectionFactory {
    async fn connect(&self) -> Result<Arc<dyn ClusterApi>, WatchError> {
        let config = self.load_config().await?;
        let cluster_url = config.cluster_url.clone();

        let client = Client::try_from(config)
            .map_err(|e| WatchError::Connection(format!("Failed to build client: {}", e)))?;

        let version = client.apiserver_version().await.map_err(|e| {
            WatchError::Connection(format!("API server {} unreachable: {}", cluster_url, e))
        })?;
        info!(
            "Connected to Kubernetes {} at {}",
            version.git_version, cluster_url
        );

        Ok(Arc::new(KubeClusterApi::new(client)))
    }
}
