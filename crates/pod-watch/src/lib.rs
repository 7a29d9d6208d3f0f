//! Pod watch fan-out engine
//!
//! Watches pods in every namespace of a Kubernetes cluster and invokes
//! caller-supplied callbacks for each change.
//!
//! # Example
//!
//! ```no_run
//! use pod_watch::{
//!     handler_fn, ConnectionProvider, KubeConnectionFactory, KubeconfigSource, SharedHandler,
//!     Supervisor,
//! };
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let provider = ConnectionProvider::new(KubeConnectionFactory::new(
//!     KubeconfigSource::from_path_or_default(None),
//! ));
//! let supervisor = Supervisor::new(provider.get_connection().await?);
//!
//! let print: SharedHandler = Arc::new(handler_fn(|_token, pod: k8s_openapi::api::core::v1::Pod| async move {
//!     println!("{:?}", pod.metadata.name);
//!     Ok(())
//! }));
//!
//! let token = CancellationToken::new();
//! supervisor.start_all(&token, &[print]).await?;
//! token.cancel();
//! supervisor.wait().await;
//! # Ok(())
//! # }
//! ```
//!
//! # Behaviour
//!
//! - **One stream per pair**: every (namespace, callback) pair has its own
//!   watch and its own task
//! - **Per-session failures**: stream and callback errors end only their
//!   session and are logged
//! - **No reconnection**: a closed stream ends its session
//! - **Startup snapshot**: namespaces are listed once

pub mod connection;
pub mod error;
pub mod event;
pub mod handler;
pub mod kube_api;
pub mod latch;
#[cfg(any(test, feature = "test-util"))]
pub mod mock;
pub mod namespaces;
pub mod session;
pub mod supervisor;

pub use connection::{ClusterApi, ConnectionFactory, ConnectionProvider, EventStream};
pub use error::WatchError;
pub use event::{ChangeEvent, EventKind};
pub use handler::{handler_fn, FnHandler, PodHandler, SharedHandler};
pub use kube_api::{default_kubeconfig_path, KubeClusterApi, KubeConnectionFactory, KubeconfigSource};
pub use latch::{CompletionGuard, CompletionLatch, Progress};
#[cfg(any(test, feature = "test-util"))]
pub use mock::{MockClusterApi, MockStep, MockStream, RecordingHandler};
pub use namespaces::{list_namespaces, NamespaceSnapshot};
pub use session::{SessionEnd, SessionReport, WatchSession};
pub use supervisor::Supervisor;
