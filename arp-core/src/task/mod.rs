//! Tracking for the background loops a component spawns.
//!
//! Every loop in a group observes the same [`CancellationToken`];
//! [`TaskGroup::shutdown`] cancels it and waits for each loop to return, so
//! once it completes nothing spawned through the group is still running.

use std::future::Future;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::warn;

pub struct TaskGroup {
    name: &'static str,
    cancel: CancellationToken,
    handles: Vec<(&'static str, JoinHandle<()>)>,
}

impl TaskGroup {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            cancel: CancellationToken::new(),
            handles: Vec::new(),
        }
    }

    /// Spawn a loop. It is given the group token and must return once the
    /// token is cancelled.
    pub fn spawn<F, Fut>(&mut self, label: &'static str, f: F)
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let handle = tokio::spawn(f(self.cancel.clone()));
        self.handles.push((label, handle));
    }

    /// Number of loops that have not finished yet.
    pub fn running(&self) -> usize {
        self.handles.iter().filter(|(_, h)| !h.is_finished()).count()
    }

    /// Cancel every loop and wait for all of them.
    pub async fn shutdown(&mut self) {
        self.cancel.cancel();
        for (label, handle) in self.handles.drain(..) {
            if let Err(e) = handle.await {
                if e.is_panic() {
                    warn!(group = self.name, task = label, "task panicked: {e}");
                }
            }
        }
    }
}

impl std::fmt::Debug for TaskGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskGroup")
            .field("name", &self.name)
            .field("running", &self.running())
            .finish()
    }
}

impl Drop for TaskGroup {
    fn drop(&mut self) {
        // Loops left behind by a group that was never shut down still stop.
        self.cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn shutdown_waits_for_every_loop() {
        let stopped = Arc::new(AtomicUsize::new(0));
        let mut group = TaskGroup::new("test");

        for _ in 0..3 {
            let stopped = stopped.clone();
            group.spawn("waiter", move |cancel| async move {
                cancel.cancelled().await;
                tokio::time::sleep(Duration::from_millis(10)).await;
                stopped.fetch_add(1, Ordering::SeqCst);
            });
        }
        assert_eq!(group.running(), 3);

        group.shutdown().await;
        assert_eq!(stopped.load(Ordering::SeqCst), 3);
        assert_eq!(group.running(), 0);
    }

    #[tokio::test]
    async fn drop_stops_loops() {
        let (done_tx, done_rx) = tokio::sync::oneshot::channel();
        let mut group = TaskGroup::new("test");
        group.spawn("waiter", move |cancel| async move {
            cancel.cancelled().await;
            let _ = done_tx.send(());
        });
        drop(group);

        tokio::time::timeout(Duration::from_secs(5), done_rx)
            .await
            .expect("loop still running")
            .unwrap();
    }
}
