//! Bounded worker pool for check execution.
//!
//! A fixed number of workers drain a bounded queue. When the queue is full,
//! `submit` rejects instead of blocking the scheduler: the miss is counted
//! and logged, and the monitor stays due for the next scan tick. This is the
//! backpressure boundary that caps concurrent outbound connections no matter
//! how many monitors are configured.

use futures::future::join_all;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

type Job = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

#[derive(Debug, Error)]
pub enum PoolError {
    #[error("worker pool saturated, task rejected")]
    Saturated,
    #[error("worker pool is shut down")]
    Closed,
}

/// Point-in-time pool statistics for health reporting.
#[derive(Debug, Clone, Copy)]
pub struct PoolStatus {
    pub active_workers: usize,
    pub max_workers: usize,
    pub queue_depth: usize,
    pub rejected_tasks: u64,
}

pub struct WorkerPool {
    tx: Mutex<Option<mpsc::Sender<Job>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    active: Arc<AtomicUsize>,
    rejected: AtomicU64,
    max_workers: usize,
    queue_capacity: usize,
}

impl WorkerPool {
    /// Spawns `max_workers` worker tasks immediately; must be called from
    /// within a tokio runtime.
    pub fn new(max_workers: usize, queue_capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel::<Job>(queue_capacity);
        let rx = Arc::new(tokio::sync::Mutex::new(rx));
        let active = Arc::new(AtomicUsize::new(0));

        let workers = (0..max_workers)
            .map(|_| {
                let rx = Arc::clone(&rx);
                let active = Arc::clone(&active);
                tokio::spawn(async move {
                    loop {
                        let job = {
                            let mut rx = rx.lock().await;
                            rx.recv().await
                        };
                        match job {
                            Some(job) => {
                                active.fetch_add(1, Ordering::SeqCst);
                                job.await;
                                active.fetch_sub(1, Ordering::SeqCst);
                            }
                            // Channel closed: shutdown in progress.
                            None => break,
                        }
                    }
                })
            })
            .collect();

        Self {
            tx: Mutex::new(Some(tx)),
            workers: Mutex::new(workers),
            active,
            rejected: AtomicU64::new(0),
            max_workers,
            queue_capacity,
        }
    }

    /// Attempts to enqueue a task. Never blocks: a full queue rejects the
    /// task (counted as a scheduling miss) and a shut-down pool refuses it.
    pub fn submit<F>(&self, task: F) -> Result<(), PoolError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let guard = self.tx.lock().unwrap();
        let tx = guard.as_ref().ok_or(PoolError::Closed)?;
        match tx.try_send(Box::pin(task)) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(_)) => {
                self.rejected.fetch_add(1, Ordering::SeqCst);
                warn!("check task rejected: worker pool saturated");
                Err(PoolError::Saturated)
            }
            Err(mpsc::error::TrySendError::Closed(_)) => Err(PoolError::Closed),
        }
    }

    pub fn status(&self) -> PoolStatus {
        let queue_depth = self
            .tx
            .lock()
            .unwrap()
            .as_ref()
            .map_or(0, |tx| self.queue_capacity - tx.capacity());
        PoolStatus {
            active_workers: self.active.load(Ordering::SeqCst),
            max_workers: self.max_workers,
            queue_depth,
            rejected_tasks: self.rejected.load(Ordering::SeqCst),
        }
    }

    pub fn rejected_tasks(&self) -> u64 {
        self.rejected.load(Ordering::SeqCst)
    }

    /// Closes intake, lets queued and in-flight tasks drain for `grace`, then
    /// aborts whatever is still running.
    pub async fn shutdown(&self, grace: Duration) {
        // Dropping the sender closes the channel; workers exit once drained.
        drop(self.tx.lock().unwrap().take());

        let workers = std::mem::take(&mut *self.workers.lock().unwrap());
        if workers.is_empty() {
            return;
        }

        let abort_handles: Vec<_> = workers.iter().map(|w| w.abort_handle()).collect();
        match tokio::time::timeout(grace, join_all(workers)).await {
            Ok(_) => debug!("worker pool drained cleanly"),
            Err(_) => {
                warn!("worker pool grace period expired, aborting remaining tasks");
                for handle in abort_handles {
                    handle.abort();
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;
    use tokio::sync::Notify;

    #[tokio::test]
    async fn executes_submitted_tasks() {
        let pool = WorkerPool::new(4, 16);
        let done = Arc::new(Notify::new());

        let signal = Arc::clone(&done);
        pool.submit(async move {
            signal.notify_one();
        })
        .unwrap();

        tokio::time::timeout(Duration::from_secs(1), done.notified())
            .await
            .expect("task never ran");
    }

    #[tokio::test]
    async fn saturation_rejects_and_counts_without_blocking() {
        let pool = WorkerPool::new(2, 2);
        let release = Arc::new(Notify::new());

        // Two tasks occupy the workers, two fill the queue; give the workers
        // a moment to pull theirs off the queue.
        let mut accepted = 0;
        for _ in 0..4 {
            let release = Arc::clone(&release);
            if pool
                .submit(async move {
                    release.notified().await;
                })
                .is_ok()
            {
                accepted += 1;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert_eq!(accepted, 4);

        // Everything beyond workers + queue must be rejected promptly.
        let started = Instant::now();
        let mut rejections = 0;
        for _ in 0..5 {
            let release = Arc::clone(&release);
            if pool
                .submit(async move {
                    release.notified().await;
                })
                .is_err()
            {
                rejections += 1;
            }
        }
        assert!(started.elapsed() < Duration::from_millis(500));
        assert_eq!(rejections, 5);
        assert_eq!(pool.rejected_tasks(), 5);
        assert!(pool.status().queue_depth >= 1);

        release.notify_waiters();
    }

    #[tokio::test]
    async fn shutdown_refuses_new_tasks() {
        let pool = WorkerPool::new(2, 4);
        pool.shutdown(Duration::from_secs(1)).await;
        let err = pool.submit(async {}).unwrap_err();
        assert!(matches!(err, PoolError::Closed));
    }

    #[tokio::test]
    async fn shutdown_waits_for_in_flight_tasks() {
        let pool = WorkerPool::new(2, 4);
        let finished = Arc::new(AtomicUsize::new(0));

        for _ in 0..2 {
            let finished = Arc::clone(&finished);
            pool.submit(async move {
                tokio::time::sleep(Duration::from_millis(50)).await;
                finished.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
        }

        pool.shutdown(Duration::from_secs(2)).await;
        assert_eq!(finished.load(Ordering::SeqCst), 2);
    }
}
