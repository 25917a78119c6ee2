//! Process configuration: scheduler tuning from the environment, monitor
//! definitions from a TOML file. Both are read once at startup and immutable
//! afterwards.
//!
//! Monitor intervals and timeouts are validated here, at the configuration
//! boundary; the scheduler assumes they hold and never re-validates per tick.

use serde::Deserialize;
use std::env;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::models::MonitorConfig;

/// Minimum allowed check interval, seconds.
pub const MIN_INTERVAL_SECONDS: u64 = 10;
/// Minimum allowed probe timeout, seconds.
pub const MIN_TIMEOUT_SECONDS: u64 = 5;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },
    #[error("invalid monitor '{name}': {reason}")]
    InvalidMonitor { name: String, reason: String },
}

/// Tuning knobs for the scheduler and check runner. Defaults mirror a small
/// single-node deployment; every knob can be overridden from the
/// environment.
#[derive(Debug, Clone)]
pub struct SchedulerSettings {
    /// Period of the scan tick that looks for due monitors.
    pub scan_interval: Duration,
    /// Maximum number of concurrently executing checks.
    pub max_workers: usize,
    /// Bound on queued-but-not-started checks; beyond it submissions are
    /// rejected and counted.
    pub queue_capacity: usize,
    /// Retries after the initial attempt, transient transport failures only.
    pub retry_attempts: u32,
    /// Fixed delay between retry attempts.
    pub retry_backoff: Duration,
    /// How long in-flight checks may keep running after shutdown starts.
    pub shutdown_grace: Duration,
    /// TTL of the active-monitor cache.
    pub cache_ttl: Duration,
    /// User-Agent header for HTTP probes.
    pub user_agent: String,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            scan_interval: Duration::from_secs(30),
            max_workers: 50,
            queue_capacity: 200,
            retry_attempts: 3,
            retry_backoff: Duration::from_millis(500),
            shutdown_grace: Duration::from_secs(30),
            cache_ttl: Duration::from_secs(300),
            user_agent: concat!("upwatch/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

fn env_parsed<T: std::str::FromStr>(key: &str) -> Result<Option<T>, ConfigError> {
    match env::var(key) {
        Ok(raw) => raw
            .parse::<T>()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue {
                key: key.to_string(),
                value: raw,
            }),
        Err(_) => Ok(None),
    }
}

impl SchedulerSettings {
    /// Defaults overridden by `UPWATCH_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut settings = Self::default();

        if let Some(secs) = env_parsed::<u64>("UPWATCH_SCAN_INTERVAL_SECONDS")? {
            settings.scan_interval = Duration::from_secs(secs.max(1));
        }
        if let Some(workers) = env_parsed::<usize>("UPWATCH_MAX_WORKERS")? {
            settings.max_workers = workers.max(1);
        }
        if let Some(capacity) = env_parsed::<usize>("UPWATCH_QUEUE_CAPACITY")? {
            settings.queue_capacity = capacity.max(1);
        }
        if let Some(attempts) = env_parsed::<u32>("UPWATCH_RETRY_ATTEMPTS")? {
            settings.retry_attempts = attempts;
        }
        if let Some(millis) = env_parsed::<u64>("UPWATCH_RETRY_BACKOFF_MS")? {
            settings.retry_backoff = Duration::from_millis(millis);
        }
        if let Some(secs) = env_parsed::<u64>("UPWATCH_SHUTDOWN_GRACE_SECONDS")? {
            settings.shutdown_grace = Duration::from_secs(secs);
        }
        if let Some(secs) = env_parsed::<u64>("UPWATCH_CACHE_TTL_SECONDS")? {
            settings.cache_ttl = Duration::from_secs(secs);
        }
        if let Ok(user_agent) = env::var("UPWATCH_USER_AGENT") {
            if !user_agent.trim().is_empty() {
                settings.user_agent = user_agent;
            }
        }

        Ok(settings)
    }
}

#[derive(Debug, Deserialize)]
struct MonitorsFile {
    #[serde(default)]
    monitors: Vec<MonitorConfig>,
}

/// Loads and validates monitor definitions from a TOML file.
pub fn load_monitors(path: &Path) -> Result<Vec<MonitorConfig>, ConfigError> {
    let raw = std::fs::read_to_string(path)?;
    let file: MonitorsFile = toml::from_str(&raw)?;
    for monitor in &file.monitors {
        validate_monitor(monitor)?;
    }
    Ok(file.monitors)
}

pub fn validate_monitor(monitor: &MonitorConfig) -> Result<(), ConfigError> {
    if monitor.target.trim().is_empty() {
        return Err(ConfigError::InvalidMonitor {
            name: monitor.name.clone(),
            reason: "target must not be empty".to_string(),
        });
    }
    if monitor.interval_seconds < MIN_INTERVAL_SECONDS {
        return Err(ConfigError::InvalidMonitor {
            name: monitor.name.clone(),
            reason: format!("check interval must be at least {MIN_INTERVAL_SECONDS} seconds"),
        });
    }
    if monitor.timeout_seconds < MIN_TIMEOUT_SECONDS {
        return Err(ConfigError::InvalidMonitor {
            name: monitor.name.clone(),
            reason: format!("timeout must be at least {MIN_TIMEOUT_SECONDS} seconds"),
        });
    }
    Ok(())
}
