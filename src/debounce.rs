use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;

/// Runs only the most recent of a burst of calls, `delay` after the last one.
///
/// A call can only be cancelled while it is still waiting out the delay.
/// Once its task has started it runs to completion, so a request that is
/// already on the wire is never cut off halfway.
#[derive(Debug)]
pub struct Debouncer {
    delay: Duration,
    inner: Mutex<Scheduled>,
}

#[derive(Debug, Default)]
struct Scheduled {
    // Wakes the latest call out of its delay without running it.
    cancel: Option<oneshot::Sender<()>>,
    handles: Vec<JoinHandle<()>>,
}

impl Scheduled {
    fn cancel_waiting(&mut self) {
        if let Some(tx) = self.cancel.take() {
            // Err means the task already left its delay; leave it running.
            let _ = tx.send(());
        }
    }
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            inner: Mutex::new(Scheduled::default()),
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Schedules `task`, cancelling the previous call if it is still waiting.
    /// Must be called from within a tokio runtime.
    pub fn call<F>(&self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let delay = self.delay;
        let (tx, rx) = oneshot::channel();
        let handle = tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = rx => return,
            }
            task.await;
        });

        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.cancel_waiting();
        inner.handles.retain(|h| !h.is_finished());
        inner.handles.push(handle);
        inner.cancel = Some(tx);
    }

    /// Drops a call that is still waiting; a started one keeps running.
    pub fn cancel(&self) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.cancel_waiting();
    }

    /// Cancels a waiting call and waits for every started one to finish.
    pub async fn settle(&self) {
        let handles = {
            let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
            inner.cancel_waiting();
            std::mem::take(&mut inner.handles)
        };
        for handle in handles {
            let _ = handle.await;
        }
    }

    /// True while a call is waiting or running.
    pub fn is_pending(&self) -> bool {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.handles.iter().any(|h| !h.is_finished())
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test(start_paused = true)]
    async fn test_burst_runs_last_call_once() {
        let debouncer = Debouncer::new(Duration::from_millis(300));
        let runs = Arc::new(AtomicUsize::new(0));
        let last = Arc::new(AtomicUsize::new(0));

        for i in 1..=5 {
            let runs = runs.clone();
            let last = last.clone();
            debouncer.call(async move {
                runs.fetch_add(1, Ordering::SeqCst);
                last.store(i, Ordering::SeqCst);
            });
            tokio::time::sleep(Duration::from_millis(100)).await;
        }

        assert_eq!(runs.load(Ordering::SeqCst), 0);
        tokio::time::sleep(Duration::from_millis(250)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert_eq!(last.load(Ordering::SeqCst), 5);
        assert!(!debouncer.is_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_drops_pending_call() {
        let debouncer = Debouncer::new(Duration::from_millis(500));
        let runs = Arc::new(AtomicUsize::new(0));
        let r = runs.clone();
        debouncer.call(async move {
            r.fetch_add(1, Ordering::SeqCst);
        });
        assert!(debouncer.is_pending());
        debouncer.cancel();
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_spaced_calls_all_run() {
        let debouncer = Debouncer::new(Duration::from_millis(300));
        let runs = Arc::new(AtomicUsize::new(0));
        for _ in 0..3 {
            let r = runs.clone();
            debouncer.call(async move {
                r.fetch_add(1, Ordering::SeqCst);
            });
            tokio::time::sleep(Duration::from_millis(400)).await;
        }
        assert_eq!(runs.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_started_call_survives_new_call_and_cancel() {
        let debouncer = Debouncer::new(Duration::from_millis(50));
        let runs = Arc::new(AtomicUsize::new(0));

        let r = runs.clone();
        debouncer.call(async move {
            // Stands in for a slow request
            tokio::time::sleep(Duration::from_millis(500)).await;
            r.fetch_add(1, Ordering::SeqCst);
        });
        tokio::time::sleep(Duration::from_millis(100)).await;

        let r = runs.clone();
        debouncer.call(async move {
            r.fetch_add(10, Ordering::SeqCst);
        });
        debouncer.cancel();
        assert!(debouncer.is_pending());

        debouncer.settle().await;
        // The started call finished; the second was still waiting and was dropped
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert!(!debouncer.is_pending());
    }
}
