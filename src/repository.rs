//! Persistence seams consumed by the scheduling engine, plus in-memory
//! implementations backing the standalone binary and the test suite.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::RwLock;
use thiserror::Error;

use crate::models::{CheckResult, MonitorConfig, MonitorStatus};

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("monitor not found: {0}")]
    NotFound(i32),
    #[error("storage error: {0}")]
    Storage(String),
}

#[async_trait]
pub trait MonitorRepository: Send + Sync {
    /// Active monitors, ordered by name.
    async fn list_active(&self) -> Result<Vec<MonitorConfig>, RepositoryError>;

    async fn find_by_id(&self, id: i32) -> Result<Option<MonitorConfig>, RepositoryError>;

    /// Stores the monitor's runtime status and last-checked timestamp.
    async fn update_status(
        &self,
        id: i32,
        status: MonitorStatus,
        checked_at: DateTime<Utc>,
    ) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait CheckRepository: Send + Sync {
    async fn save(&self, check: &CheckResult) -> Result<(), RepositoryError>;

    /// Most recent checks for a monitor, newest first.
    async fn recent_checks(
        &self,
        monitor_id: i32,
        limit: usize,
    ) -> Result<Vec<CheckResult>, RepositoryError>;

    /// Checks within `[from, to]`, newest first.
    async fn checks_between(
        &self,
        monitor_id: i32,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<CheckResult>, RepositoryError>;
}

#[derive(Default)]
pub struct MemoryMonitorRepository {
    monitors: RwLock<HashMap<i32, MonitorConfig>>,
}

impl MemoryMonitorRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, monitor: MonitorConfig) {
        self.monitors.write().unwrap().insert(monitor.id, monitor);
    }
}

#[async_trait]
impl MonitorRepository for MemoryMonitorRepository {
    async fn list_active(&self) -> Result<Vec<MonitorConfig>, RepositoryError> {
        let mut active: Vec<MonitorConfig> = self
            .monitors
            .read()
            .unwrap()
            .values()
            .filter(|m| m.is_active)
            .cloned()
            .collect();
        active.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(active)
    }

    async fn find_by_id(&self, id: i32) -> Result<Option<MonitorConfig>, RepositoryError> {
        Ok(self.monitors.read().unwrap().get(&id).cloned())
    }

    async fn update_status(
        &self,
        id: i32,
        status: MonitorStatus,
        checked_at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        let mut monitors = self.monitors.write().unwrap();
        let monitor = monitors.get_mut(&id).ok_or(RepositoryError::NotFound(id))?;
        monitor.current_status = status;
        monitor.last_checked = Some(checked_at);
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryCheckRepository {
    checks: RwLock<HashMap<i32, Vec<CheckResult>>>,
}

impl MemoryCheckRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CheckRepository for MemoryCheckRepository {
    async fn save(&self, check: &CheckResult) -> Result<(), RepositoryError> {
        self.checks
            .write()
            .unwrap()
            .entry(check.monitor_id)
            .or_default()
            .push(check.clone());
        Ok(())
    }

    async fn recent_checks(
        &self,
        monitor_id: i32,
        limit: usize,
    ) -> Result<Vec<CheckResult>, RepositoryError> {
        let checks = self.checks.read().unwrap();
        let mut recent: Vec<CheckResult> = checks
            .get(&monitor_id)
            .map(|c| c.iter().rev().take(limit).cloned().collect())
            .unwrap_or_default();
        recent.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(recent)
    }

    async fn checks_between(
        &self,
        monitor_id: i32,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<CheckResult>, RepositoryError> {
        let checks = self.checks.read().unwrap();
        let mut window: Vec<CheckResult> = checks
            .get(&monitor_id)
            .map(|c| {
                c.iter()
                    .filter(|check| check.timestamp >= from && check.timestamp <= to)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        window.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(window)
    }
}
