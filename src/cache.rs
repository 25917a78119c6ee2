//! Read-through cache for the active-monitor set, so every scan tick does
//! not turn into a full repository query.

use std::future::Future;
use std::sync::RwLock;
use std::time::{Duration, Instant};
use tracing::debug;

use crate::models::MonitorConfig;
use crate::repository::RepositoryError;

struct CachedMonitors {
    cached_at: Instant,
    monitors: Vec<MonitorConfig>,
}

pub struct ActiveMonitorCache {
    ttl: Duration,
    inner: RwLock<Option<CachedMonitors>>,
}

impl ActiveMonitorCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            inner: RwLock::new(None),
        }
    }

    /// Cached set, or `None` when absent or expired.
    pub fn get(&self) -> Option<Vec<MonitorConfig>> {
        let guard = self.inner.read().unwrap();
        match guard.as_ref() {
            Some(entry) if entry.cached_at.elapsed() < self.ttl => Some(entry.monitors.clone()),
            _ => None,
        }
    }

    /// Caches a non-empty set. An empty list invalidates instead, so a
    /// transient empty read never masks monitors for a whole TTL.
    pub fn put(&self, monitors: Vec<MonitorConfig>) {
        if monitors.is_empty() {
            debug!("skipping cache update for empty monitor list");
            self.invalidate();
            return;
        }
        let mut guard = self.inner.write().unwrap();
        *guard = Some(CachedMonitors {
            cached_at: Instant::now(),
            monitors,
        });
    }

    pub fn invalidate(&self) {
        *self.inner.write().unwrap() = None;
    }

    /// Returns the cached set, or loads, caches, and returns a fresh one.
    pub async fn get_or_refresh<F, Fut>(
        &self,
        loader: F,
    ) -> Result<Vec<MonitorConfig>, RepositoryError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<MonitorConfig>, RepositoryError>>,
    {
        if let Some(monitors) = self.get() {
            return Ok(monitors);
        }
        let fresh = loader().await?;
        self.put(fresh.clone());
        Ok(fresh)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MonitorStatus, MonitorType};
    use std::sync::atomic::{AtomicU32, Ordering};

    fn monitor(id: i32) -> MonitorConfig {
        MonitorConfig {
            id,
            name: format!("monitor-{id}"),
            target: "example.com:80".to_string(),
            monitor_type: MonitorType::Tcp,
            interval_seconds: 60,
            timeout_seconds: 10,
            max_redirects: 5,
            expected_status_codes: vec![200],
            keyword: None,
            is_active: true,
            current_status: MonitorStatus::Pending,
            last_checked: None,
        }
    }

    #[tokio::test]
    async fn get_or_refresh_loads_once_within_ttl() {
        let cache = ActiveMonitorCache::new(Duration::from_secs(60));
        let loads = AtomicU32::new(0);

        for _ in 0..3 {
            let monitors = cache
                .get_or_refresh(|| {
                    loads.fetch_add(1, Ordering::SeqCst);
                    async { Ok(vec![monitor(1)]) }
                })
                .await
                .unwrap();
            assert_eq!(monitors.len(), 1);
        }

        assert_eq!(loads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn empty_lists_are_not_cached() {
        let cache = ActiveMonitorCache::new(Duration::from_secs(60));
        cache.put(Vec::new());
        assert!(cache.get().is_none());

        let loads = AtomicU32::new(0);
        cache
            .get_or_refresh(|| {
                loads.fetch_add(1, Ordering::SeqCst);
                async { Ok(Vec::new()) }
            })
            .await
            .unwrap();
        cache
            .get_or_refresh(|| {
                loads.fetch_add(1, Ordering::SeqCst);
                async { Ok(Vec::new()) }
            })
            .await
            .unwrap();

        // Empty results keep hitting the loader.
        assert_eq!(loads.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn expired_entries_miss() {
        let cache = ActiveMonitorCache::new(Duration::from_millis(10));
        cache.put(vec![monitor(1)]);
        assert!(cache.get().is_some());

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(cache.get().is_none());
    }

    #[tokio::test]
    async fn invalidate_clears_the_entry() {
        let cache = ActiveMonitorCache::new(Duration::from_secs(60));
        cache.put(vec![monitor(1)]);
        cache.invalidate();
        assert!(cache.get().is_none());
    }
}
