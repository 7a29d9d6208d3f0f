//! Callback contract invoked once per observed pod change.

use k8s_openapi::api::core::v1::Pod;
use std::future::Future;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Reaction to a pod change.
///
/// Handlers run synchronously inside their session: the next event is not
/// read until `handle` returns. Long-running work should watch `token` and
/// give up once it is cancelled. Returning an error ends the session.
#[async_trait::async_trait]
pub trait PodHandler: Send + Sync {
    /// Handles one decoded pod.
    async fn handle(&self, token: &CancellationToken, pod: Pod) -> anyhow::Result<()>;
}

/// Handler shared by every session that uses it.
pub type SharedHandler = Arc<dyn PodHandler>;

/// Adapter turning an async closure into a [`PodHandler`].
#[derive(Debug, Clone)]
pub struct FnHandler<F>(F);

/// Wraps `f` as a handler.
///
/// ```no_run
/// use pod_watch::handler_fn;
///
/// let handler = handler_fn(|_token, pod: k8s_openapi::api::core::v1::Pod| async move {
///     println!("{:?}", pod.metadata.name);
///     Ok(())
/// });
/// ```
pub fn handler_fn<F, Fut>(f: F) -> FnHandler<F>
where
    F: Fn(CancellationToken, Pod) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<()>> + Send,
{
    FnHandler(f)
}

#[async_trait::async_trait]
impl<F, Fut> PodHandler for FnHandler<F>
where
    F: Fn(CancellationToken, Pod) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<()>> + Send,
{
    async fn handle(&self, token: &CancellationToken, pod: Pod) -> anyhow::Result<()> {
        (self.0)(token.clone(), pod).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_handler_fn_forwards_pod() {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&calls);
        let handler: SharedHandler = Arc::new(handler_fn(move |_token, pod: Pod| {
            let seen = Arc::clone(&seen);
            async move {
                assert_eq!(pod.metadata.name.as_deref(), Some("api-7"));
                seen.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        }));

        let mut pod = Pod::default();
        pod.metadata.name = Some("api-7".to_string());
        handler.handle(&CancellationToken::new(), pod).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_handler_fn_propagates_error() {
        let handler = handler_fn(|_token, _pod| async { anyhow::bail!("boom") });
        let err = handler
            .handle(&CancellationToken::new(), Pod::default())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "boom");
    }
}
