//! Detached background work.
//!
//! Cache population and eviction run on tasks spawned here. They are never
//! awaited by the request that scheduled them, so a cancelled or timed-out
//! client does not abort an in-flight cache write. The in-flight counter lets
//! shutdown drain outstanding work.

use std::{
    future::Future,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use tokio::sync::Notify;
use tracing::{Instrument, warn};

#[derive(Clone, Default)]
pub struct BackgroundTasks {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    inflight: AtomicUsize,
    idle: Notify,
}

struct InflightGuard {
    inner: Arc<Inner>,
}

impl Drop for InflightGuard {
    fn drop(&mut self) {
        if self.inner.inflight.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.inner.idle.notify_waiters();
        }
    }
}

impl BackgroundTasks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn `task` detached from the caller. Panics inside the task are
    /// contained by the runtime and only decrement the in-flight count.
    pub fn spawn<F>(&self, name: &'static str, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.inner.inflight.fetch_add(1, Ordering::AcqRel);
        let guard = InflightGuard {
            inner: Arc::clone(&self.inner),
        };
        let span = tracing::debug_span!("background", task = name);

        tokio::spawn(
            async move {
                let _guard = guard;
                task.await;
            }
            .instrument(span),
        );
    }

    pub fn inflight(&self) -> usize {
        self.inner.inflight.load(Ordering::Acquire)
    }

    /// Wait until no background task is running.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.inner.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.inflight() == 0 {
                return;
            }
            notified.await;
        }
    }

    /// Wait for outstanding work, giving up after `timeout`.
    pub async fn drain(&self, timeout: Duration) -> bool {
        match tokio::time::timeout(timeout, self.wait_idle()).await {
            Ok(()) => true,
            Err(_) => {
                warn!(
                    target = "blobgate::background",
                    inflight = self.inflight(),
                    "background tasks still running at shutdown"
                );
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::oneshot;

    #[tokio::test]
    async fn wait_idle_returns_immediately_without_work() {
        let tasks = BackgroundTasks::new();
        tasks.wait_idle().await;
        assert_eq!(tasks.inflight(), 0);
    }

    #[tokio::test]
    async fn wait_idle_blocks_until_tasks_finish() {
        let tasks = BackgroundTasks::new();
        let (release_tx, release_rx) = oneshot::channel::<()>();

        tasks.spawn("test", async move {
            let _ = release_rx.await;
        });
        assert_eq!(tasks.inflight(), 1);

        let waiter = {
            let tasks = tasks.clone();
            tokio::spawn(async move { tasks.wait_idle().await })
        };

        release_tx.send(()).expect("task still waiting");
        waiter.await.expect("waiter joined");
        assert_eq!(tasks.inflight(), 0);
    }

    #[tokio::test]
    async fn drain_times_out_on_stuck_task() {
        let tasks = BackgroundTasks::new();
        tasks.spawn("stuck", std::future::pending());

        assert!(!tasks.drain(Duration::from_millis(20)).await);
        assert_eq!(tasks.inflight(), 1);
    }

    #[tokio::test]
    async fn panicking_task_still_releases_counter() {
        let tasks = BackgroundTasks::new();
        tasks.spawn("panics", async { panic!("boom") });

        tasks.wait_idle().await;
        assert_eq!(tasks.inflight(), 0);
    }
}
