//! Completion latch joining every spawned watch task.
//!
//! Each task holds a [`CompletionGuard`]; dropping it (normal return, error,
//! panic or runtime shutdown) records the task as finished exactly once.

use std::sync::Arc;
use tokio::sync::watch;
use tracing::debug;

/// Launched and completed task counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Progress {
    /// Tasks registered with the latch
    pub launched: usize,
    /// Tasks that signaled completion
    pub completed: usize,
}

impl Progress {
    /// Tasks still running.
    #[must_use]
    pub fn outstanding(&self) -> usize {
        self.launched - self.completed
    }
}

/// Counter plus condition signal shared by the supervisor and its tasks.
#[derive(Debug, Clone)]
pub struct CompletionLatch {
    progress: Arc<watch::Sender<Progress>>,
}

impl Default for CompletionLatch {
    fn default() -> Self {
        Self::new()
    }
}

impl CompletionLatch {
    /// Creates a latch with nothing launched.
    #[must_use]
    pub fn new() -> Self {
        let (progress, _) = watch::channel(Progress::default());
        Self {
            progress: Arc::new(progress),
        }
    }

    /// Registers one task and returns its completion guard.
    #[must_use = "dropping the guard immediately marks the task as completed"]
    pub fn arm(&self) -> CompletionGuard {
        self.progress.send_modify(|p| p.launched += 1);
        CompletionGuard {
            progress: Arc::clone(&self.progress),
        }
    }

    /// Current counts.
    #[must_use]
    pub fn progress(&self) -> Progress {
        *self.progress.borrow()
    }

    /// Blocks until every armed guard has been dropped.
    pub async fn wait(&self) {
        let mut progress = self.progress.subscribe();
        if progress
            .wait_for(|p| p.completed == p.launched)
            .await
            .is_err()
        {
            debug!("Completion latch closed while waiting");
        }
    }
}

/// Marks one task as completed when dropped.
#[derive(Debug)]
pub struct CompletionGuard {
    progress: Arc<watch::Sender<Progress>>,
}

impl Drop for CompletionGuard {
    fn drop(&mut self) {
        self.progress.send_modify(|p| p.completed += 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::timeout;

    #[tokio::test]
    async fn test_wait_returns_immediately_when_nothing_launched() {
        let latch = CompletionLatch::new();
        timeout(Duration::from_millis(100), latch.wait())
            .await
            .expect("empty latch should not block");
    }

    #[tokio::test]
    async fn test_wait_blocks_until_all_guards_drop() {
        let latch = CompletionLatch::new();
        let guards: Vec<_> = (0..3).map(|_| latch.arm()).collect();
        assert_eq!(latch.progress().outstanding(), 3);

        assert!(timeout(Duration::from_millis(50), latch.wait()).await.is_err());

        // Completion order does not matter
        let mut guards = guards.into_iter();
        let first = guards.next().unwrap();
        for (delay, guard) in [30u64, 10].into_iter().zip(guards) {
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(delay)).await;
                drop(guard);
            });
        }
        drop(first);

        timeout(Duration::from_secs(1), latch.wait())
            .await
            .expect("latch should open once all guards dropped");
        assert_eq!(
            latch.progress(),
            Progress {
                launched: 3,
                completed: 3
            }
        );
    }

    #[tokio::test]
    async fn test_panicking_task_still_completes() {
        let latch = CompletionLatch::new();
        let guard = latch.arm();
        let handle = tokio::spawn(async move {
            let _guard = guard;
            panic!("session blew up");
        });
        assert!(handle.await.is_err());

        timeout(Duration::from_millis(100), latch.wait())
            .await
            .expect("panicked task should count as completed");
        assert_eq!(latch.progress().completed, 1);
    }
}
