//! Check scheduling: a periodic scan over the active-monitor set that
//! dispatches due monitors onto the bounded worker pool.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::cache::ActiveMonitorCache;
use crate::config::SchedulerSettings;
use crate::evaluator::StatusEvaluator;
use crate::models::MonitorConfig;
use crate::repository::{MonitorRepository, RepositoryError};
use crate::runner::CheckRunner;

pub mod pool;

pub use pool::{PoolError, PoolStatus, WorkerPool};

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("monitor not found: {0}")]
    MonitorNotFound(i32),
    #[error("cannot check inactive monitor: {0}")]
    MonitorInactive(i32),
    #[error("worker pool saturated")]
    Saturated,
    #[error("scheduler is shut down")]
    ShutDown,
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl From<PoolError> for SchedulerError {
    fn from(e: PoolError) -> Self {
        match e {
            PoolError::Saturated => SchedulerError::Saturated,
            PoolError::Closed => SchedulerError::ShutDown,
        }
    }
}

/// Snapshot of scheduler health for status endpoints.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SchedulerStatus {
    pub running: bool,
    pub active_workers: usize,
    pub max_workers: usize,
    pub queue_depth: usize,
    pub rejected_tasks: u64,
    pub scheduled_monitor_count: usize,
}

pub struct Scheduler {
    settings: SchedulerSettings,
    monitors: Arc<dyn MonitorRepository>,
    cache: ActiveMonitorCache,
    runner: Arc<CheckRunner>,
    evaluator: Arc<StatusEvaluator>,
    pool: WorkerPool,
    /// Monitor id -> time of the most recent dispatch. Written by the scan
    /// loop and by manual triggers, read by the due-ness decision; dashmap
    /// because workers and the scan task touch it concurrently.
    last_checked: DashMap<i32, DateTime<Utc>>,
    running: AtomicBool,
    shutdown_tx: watch::Sender<bool>,
}

impl Scheduler {
    pub fn new(
        settings: SchedulerSettings,
        monitors: Arc<dyn MonitorRepository>,
        runner: Arc<CheckRunner>,
        evaluator: Arc<StatusEvaluator>,
    ) -> Self {
        let pool = WorkerPool::new(settings.max_workers, settings.queue_capacity);
        let cache = ActiveMonitorCache::new(settings.cache_ttl);
        let (shutdown_tx, _) = watch::channel(false);
        info!(
            max_workers = settings.max_workers,
            queue_capacity = settings.queue_capacity,
            scan_interval_secs = settings.scan_interval.as_secs(),
            "scheduler initialized"
        );
        Self {
            settings,
            monitors,
            cache,
            runner,
            evaluator,
            pool,
            last_checked: DashMap::new(),
            running: AtomicBool::new(true),
            shutdown_tx,
        }
    }

    /// Spawns the scan loop. It runs until [`Scheduler::shutdown`] is called.
    pub fn start(self: Arc<Self>) -> JoinHandle<()> {
        tokio::spawn(async move { self.scan_loop().await })
    }

    async fn scan_loop(&self) {
        let mut ticker = interval(self.settings.scan_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if !self.running.load(Ordering::SeqCst) {
                        break;
                    }
                    match self.scan_once().await {
                        Ok(dispatched) if dispatched > 0 => {
                            debug!(dispatched, "scan tick dispatched checks");
                        }
                        Ok(_) => {}
                        // A failed scan never stops the loop; the next tick
                        // gets a fresh chance.
                        Err(e) => error!(error = %e, "monitor scan failed"),
                    }
                }
                _ = shutdown_rx.changed() => {
                    info!("scheduler loop stopping");
                    break;
                }
            }
        }
    }

    /// One scan pass: fetch the active set through the cache and dispatch
    /// every due monitor. Returns how many checks were dispatched.
    pub async fn scan_once(&self) -> Result<usize, SchedulerError> {
        let monitors = self
            .cache
            .get_or_refresh(|| {
                let repo = Arc::clone(&self.monitors);
                async move { repo.list_active().await }
            })
            .await?;

        let now = Utc::now();
        let mut dispatched = 0;
        for monitor in &monitors {
            if !self.is_due(monitor, now) {
                continue;
            }
            match self.dispatch(monitor) {
                Ok(()) => dispatched += 1,
                // The monitor stays due; the next tick retries it.
                Err(SchedulerError::Saturated) => {
                    warn!(monitor_id = monitor.id, "check dispatch rejected, pool saturated");
                }
                Err(e) => {
                    error!(monitor_id = monitor.id, error = %e, "failed to dispatch check");
                }
            }
        }
        Ok(dispatched)
    }

    fn is_due(&self, monitor: &MonitorConfig, now: DateTime<Utc>) -> bool {
        match self.last_checked.get(&monitor.id) {
            None => true,
            Some(last) => {
                let elapsed = now.signed_duration_since(*last).num_seconds();
                elapsed >= monitor.interval_seconds as i64
            }
        }
    }

    /// Enqueues a check task. `last_checked` is recorded on successful
    /// enqueue, before the task executes, so a slow scan or a worker backlog
    /// cannot double-schedule the monitor. A rejected enqueue records
    /// nothing, leaving the monitor due for the next tick.
    fn dispatch(&self, monitor: &MonitorConfig) -> Result<(), SchedulerError> {
        let runner = Arc::clone(&self.runner);
        let evaluator = Arc::clone(&self.evaluator);
        let monitor_task = monitor.clone();

        self.pool.submit(async move {
            match runner.run(&monitor_task).await {
                Ok(check) => {
                    if let Err(e) = evaluator.process(&monitor_task, check).await {
                        error!(
                            monitor_id = monitor_task.id,
                            error = %e,
                            "failed to record check outcome"
                        );
                    }
                }
                Err(e) => {
                    warn!(monitor_id = monitor_task.id, error = %e, "check skipped");
                }
            }
        })?;

        self.last_checked.insert(monitor.id, Utc::now());
        Ok(())
    }

    /// Manual trigger: bypasses due-ness but still updates `last_checked`
    /// so the next scheduled tick does not immediately re-queue the monitor.
    pub async fn trigger_immediate_check(&self, monitor_id: i32) -> Result<(), SchedulerError> {
        if !self.running.load(Ordering::SeqCst) {
            return Err(SchedulerError::ShutDown);
        }

        let monitor = self
            .monitors
            .find_by_id(monitor_id)
            .await?
            .ok_or(SchedulerError::MonitorNotFound(monitor_id))?;
        if !monitor.is_active {
            return Err(SchedulerError::MonitorInactive(monitor_id));
        }

        info!(monitor_id, name = %monitor.name, "triggering immediate check");
        self.dispatch(&monitor)
    }

    pub fn status(&self) -> SchedulerStatus {
        let pool = self.pool.status();
        SchedulerStatus {
            running: self.running.load(Ordering::SeqCst),
            active_workers: pool.active_workers,
            max_workers: pool.max_workers,
            queue_depth: pool.queue_depth,
            rejected_tasks: pool.rejected_tasks,
            scheduled_monitor_count: self.last_checked.len(),
        }
    }

    /// Stops accepting new ticks, then drains the pool: in-flight checks get
    /// the configured grace period before being aborted.
    pub async fn shutdown(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }
        info!("shutting down scheduler");
        let _ = self.shutdown_tx.send(true);
        self.pool.shutdown(self.settings.shutdown_grace).await;
    }
}
