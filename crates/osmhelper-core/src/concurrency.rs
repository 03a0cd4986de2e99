//! Bounded-concurrency runner for fan-out calls (one request per member,
//! list or account).

use std::future::Future;
use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::Semaphore;

/// Caps how many task bodies run at once. Waiting tasks are admitted in
/// submission order as running ones finish, whether they succeeded or failed.
#[derive(Debug, Clone)]
pub struct ConcurrencyLimiter {
    semaphore: Arc<Semaphore>,
    max_concurrent: usize,
}

/// Shorthand for [`ConcurrencyLimiter::new`].
pub fn limit(max_concurrent: usize) -> ConcurrencyLimiter {
    ConcurrencyLimiter::new(max_concurrent)
}

impl ConcurrencyLimiter {
    /// A limit of zero is treated as one.
    pub fn new(max_concurrent: usize) -> Self {
        let max_concurrent = max_concurrent.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(max_concurrent)),
            max_concurrent,
        }
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    /// Tasks that could start right now without queueing.
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Run `task` once a slot is free. The slot is released when the task
    /// settles.
    pub async fn run<F: Future>(&self, task: F) -> F::Output {
        // The semaphore is never closed, so acquire only fails if that changes.
        let _permit = self.semaphore.acquire().await.ok();
        task.await
    }

    /// Run every task under the limit and return their outputs in
    /// submission order (completion order may differ).
    pub async fn run_all<I, F>(&self, tasks: I) -> Vec<F::Output>
    where
        I: IntoIterator<Item = F>,
        F: Future,
    {
        join_all(tasks.into_iter().map(|task| self.run(task))).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn test_never_exceeds_limit() {
        let limiter = limit(3);
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let tasks = (0..10u64).map(|i| {
            let running = running.clone();
            let peak = peak.clone();
            async move {
                let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(10 + i * 3)).await;
                running.fetch_sub(1, Ordering::SeqCst);
                i
            }
        });

        let results = limiter.run_all(tasks).await;
        assert_eq!(results, (0..10).collect::<Vec<_>>());
        assert_eq!(peak.load(Ordering::SeqCst), 3);
        assert_eq!(running.load(Ordering::SeqCst), 0);
        assert_eq!(limiter.available(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failures_do_not_block_queue() {
        let limiter = limit(2);
        let tasks = (0..6u32).map(|i| async move {
            tokio::time::sleep(Duration::from_millis(5)).await;
            if i % 2 == 0 {
                Err(format!("task {i} failed"))
            } else {
                Ok(i)
            }
        });

        let results = limiter.run_all(tasks).await;
        assert_eq!(results.len(), 6);
        assert_eq!(results.iter().filter(|r| r.is_err()).count(), 3);
        assert_eq!(results[1], Ok(1));
        assert_eq!(limiter.available(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_admission_is_fifo() {
        let limiter = limit(1);
        let started = Arc::new(Mutex::new(Vec::new()));

        let tasks = (0..5u32).map(|i| {
            let started = started.clone();
            async move {
                started.lock().unwrap().push(i);
                tokio::time::sleep(Duration::from_millis(1)).await;
            }
        });
        limiter.run_all(tasks).await;

        assert_eq!(*started.lock().unwrap(), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_zero_limit_is_one() {
        assert_eq!(limit(0).max_concurrent(), 1);
    }
}
