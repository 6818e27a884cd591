//! Dynamically sized worker pool for listener dispatch
//!
//! The pool keeps a floor of `min_workers` live workers consuming one shared
//! FIFO task queue, and grows past the floor whenever tasks are queued faster
//! than free workers can claim them. A worker that finishes a task while the
//! pool is above the floor retires instead of returning to the free set, so
//! the pool shrinks back down on its own once a burst has passed.
//!
//! [`WorkerPool::submit`] never blocks the caller: signals can arrive on the
//! transport faster than slow UI listeners consume them, and each listener
//! invocation runs as its own independent task so one slow listener only ever
//! delays its own worker.

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{watch, Notify};

/// Default floor of live workers, matching the default dispatch pool size
pub const DEFAULT_MIN_WORKERS: usize = 5;

type Task = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// A floor-bounded, dynamically growing pool of worker tasks
///
/// Task failures are the task's own responsibility: delivery closures are
/// expected to contain their errors, and the pool never observes them.
pub struct WorkerPool {
    inner: Arc<PoolInner>,
}

struct PoolInner {
    min_workers: usize,
    state: Mutex<PoolState>,
    notify: Notify,
    shutdown: watch::Sender<bool>,
}

struct PoolState {
    queue: VecDeque<Task>,
    /// Total live workers (free + busy)
    live: usize,
    /// Workers currently parked waiting for a task
    free: usize,
    shutdown: bool,
}

impl WorkerPool {
    /// Create a pool with the default worker floor
    pub fn new() -> Self {
        Self::with_min_workers(DEFAULT_MIN_WORKERS)
    }

    /// Create a pool that never shrinks below `min_workers` live workers
    ///
    /// A floor of zero is valid: the pool grows on demand and fully drains
    /// when idle.
    pub fn with_min_workers(min_workers: usize) -> Self {
        let (shutdown, _) = watch::channel(false);
        let inner = Arc::new(PoolInner {
            min_workers,
            state: Mutex::new(PoolState {
                queue: VecDeque::new(),
                live: min_workers,
                free: min_workers,
                shutdown: false,
            }),
            notify: Notify::new(),
            shutdown,
        });

        for _ in 0..min_workers {
            Self::spawn_worker(Arc::clone(&inner));
        }

        tracing::debug!(min_workers, "worker pool started");

        Self { inner }
    }

    /// Enqueue a task for asynchronous execution; never blocks
    ///
    /// If every live worker is already claimed, a new worker is spawned to
    /// keep the queue moving. Tasks submitted after [`shutdown`] are dropped.
    ///
    /// [`shutdown`]: WorkerPool::shutdown
    pub fn submit<F>(&self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        {
            let mut state = self.inner.state.lock();
            if state.shutdown {
                tracing::warn!("task submitted after pool shutdown; dropping");
                return;
            }
            state.queue.push_back(Box::pin(task));

            // Grow when queued tasks outnumber free workers. Comparing queue
            // depth against the free count (under the same lock the workers
            // use to claim tasks) keeps growth deterministic even when a
            // burst of submits lands before any worker wakes up.
            if state.queue.len() > state.free {
                state.live += 1;
                state.free += 1;
                tracing::debug!(live = state.live, "growing worker pool");
                Self::spawn_worker(Arc::clone(&self.inner));
            }
        }
        self.inner.notify.notify_one();
    }

    /// Signal every live worker to stop after its current task; idempotent
    ///
    /// Parked workers are released via cancellation rather than by waiting
    /// for the queue to drain; queued tasks that no worker has claimed yet
    /// are discarded and will never run.
    pub fn shutdown(&self) {
        {
            let mut state = self.inner.state.lock();
            if state.shutdown {
                return;
            }
            state.shutdown = true;
            let dropped = state.queue.len();
            state.queue.clear();
            if dropped > 0 {
                tracing::debug!(dropped, "discarding queued tasks on shutdown");
            }
        }
        let _ = self.inner.shutdown.send(true);
        tracing::debug!("worker pool shut down");
    }

    /// Number of live workers (free + busy)
    pub fn live_workers(&self) -> usize {
        self.inner.state.lock().live
    }

    /// Number of workers currently parked waiting for a task
    pub fn free_workers(&self) -> usize {
        self.inner.state.lock().free
    }

    /// Number of queued tasks no worker has claimed yet
    pub fn queued_tasks(&self) -> usize {
        self.inner.state.lock().queue.len()
    }

    fn spawn_worker(inner: Arc<PoolInner>) {
        tokio::spawn(async move {
            let mut shutdown_rx = inner.shutdown.subscribe();
            loop {
                let mut notified = std::pin::pin!(inner.notify.notified());

                let task = {
                    let mut state = inner.state.lock();
                    if state.shutdown {
                        state.free -= 1;
                        state.live -= 1;
                        break;
                    }
                    match state.queue.pop_front() {
                        Some(task) => {
                            state.free -= 1;
                            Some(task)
                        }
                        None => {
                            // Register as a waiter before the lock drops; an
                            // unpolled Notified is not registered, and a
                            // notify_one landing in that window would be
                            // collapsed into a single stored permit.
                            notified.as_mut().enable();
                            None
                        }
                    }
                };

                match task {
                    Some(task) => {
                        task.await;

                        let mut state = inner.state.lock();
                        if state.shutdown || state.live > inner.min_workers {
                            state.live -= 1;
                            tracing::trace!(live = state.live, "worker retiring");
                            break;
                        }
                        state.free += 1;
                    }
                    None => {
                        tokio::select! {
                            _ = notified => {}
                            _ = shutdown_rx.changed() => {}
                        }
                    }
                }
            }
        });
    }
}

impl Default for WorkerPool {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use super::*;

    async fn wait_until(what: &str, mut condition: impl FnMut() -> bool) {
        for _ in 0..400 {
            if condition() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("timed out waiting for: {}", what);
    }

    #[tokio::test]
    async fn test_floor_workers_exist_when_idle() {
        let pool = WorkerPool::with_min_workers(2);

        assert_eq!(pool.live_workers(), 2);
        assert_eq!(pool.free_workers(), 2);

        pool.shutdown();
    }

    #[tokio::test]
    async fn test_tasks_run() {
        let pool = WorkerPool::with_min_workers(2);
        let counter = Arc::new(AtomicUsize::new(0));

        for _ in 0..5 {
            let counter = Arc::clone(&counter);
            pool.submit(async move {
                counter.fetch_add(1, Ordering::SeqCst);
            });
        }

        wait_until("all tasks executed", || counter.load(Ordering::SeqCst) == 5).await;

        pool.shutdown();
    }

    #[tokio::test]
    async fn test_pool_grows_and_shrinks_to_floor() {
        let pool = WorkerPool::with_min_workers(2);
        let (release, _) = watch::channel(false);

        for _ in 0..10 {
            let mut gate = release.subscribe();
            pool.submit(async move {
                let _ = gate.changed().await;
            });
        }

        // Ten long-running tasks force the pool past its floor.
        wait_until("pool grew to 10 workers", || pool.live_workers() >= 10).await;

        release.send(true).unwrap();

        // Workers retire one by one until only the floor remains.
        wait_until("pool shrank to floor", || {
            pool.live_workers() == 2 && pool.free_workers() == 2
        })
        .await;

        pool.shutdown();
    }

    #[tokio::test]
    async fn test_free_worker_picks_up_task_behind_a_slow_one() {
        let pool = WorkerPool::with_min_workers(2);
        let (release, mut gate) = watch::channel(false);
        let counter = Arc::new(AtomicUsize::new(0));

        // Two back-to-back submits against two free workers: no growth is
        // triggered, so the second task must be claimed by the second
        // worker while the first is still blocked.
        pool.submit(async move {
            let _ = gate.changed().await;
        });
        let c = Arc::clone(&counter);
        pool.submit(async move {
            c.fetch_add(1, Ordering::SeqCst);
        });

        wait_until("quick task ran while slow task blocked", || {
            counter.load(Ordering::SeqCst) == 1
        })
        .await;

        release.send(true).unwrap();
        pool.shutdown();
    }

    #[tokio::test]
    async fn test_zero_floor_drains_to_zero() {
        let pool = WorkerPool::with_min_workers(0);

        assert_eq!(pool.live_workers(), 0);

        let counter = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&counter);
        pool.submit(async move {
            c.fetch_add(1, Ordering::SeqCst);
        });

        wait_until("task executed", || counter.load(Ordering::SeqCst) == 1).await;
        wait_until("pool drained", || pool.live_workers() == 0).await;

        pool.shutdown();
    }

    #[tokio::test]
    async fn test_shutdown_releases_parked_workers() {
        let pool = WorkerPool::with_min_workers(3);

        pool.shutdown();
        // Idempotent.
        pool.shutdown();

        wait_until("all workers exited", || pool.live_workers() == 0).await;
    }

    #[tokio::test]
    async fn test_no_execution_after_shutdown() {
        let pool = WorkerPool::with_min_workers(1);
        let counter = Arc::new(AtomicUsize::new(0));

        pool.shutdown();

        let c = Arc::clone(&counter);
        pool.submit(async move {
            c.fetch_add(1, Ordering::SeqCst);
        });

        // Dropped outright, not queued.
        assert_eq!(pool.queued_tasks(), 0);

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_in_flight_task_finishes_during_shutdown() {
        let pool = WorkerPool::with_min_workers(1);
        let (started_tx, started_rx) = tokio::sync::oneshot::channel();
        let (release, mut gate) = watch::channel(false);
        let counter = Arc::new(AtomicUsize::new(0));

        let c = Arc::clone(&counter);
        pool.submit(async move {
            let _ = started_tx.send(());
            let _ = gate.changed().await;
            c.fetch_add(1, Ordering::SeqCst);
        });

        started_rx.await.unwrap();
        pool.shutdown();
        release.send(true).unwrap();

        wait_until("in-flight task finished", || {
            counter.load(Ordering::SeqCst) == 1
        })
        .await;
        wait_until("all workers exited", || pool.live_workers() == 0).await;
    }
}
