//! Notification seam for status transitions. The engine only ever calls
//! `notify(monitor, check, transitioned)`; what delivery looks like is the
//! dispatcher's business.

use async_trait::async_trait;
use thiserror::Error;
use tracing::info;

use crate::models::{CheckResult, MonitorConfig};

pub mod webhook;

pub use webhook::WebhookSender;

#[derive(Debug, Error)]
pub enum NotificationError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
    #[error("send failed: {0}")]
    SendFailed(String),
}

#[async_trait]
pub trait NotificationDispatcher: Send + Sync {
    async fn notify(
        &self,
        monitor: &MonitorConfig,
        check: &CheckResult,
        transitioned: bool,
    ) -> Result<(), NotificationError>;
}

/// Default dispatcher: writes the status change to the log and nothing else.
pub struct LogDispatcher;

impl LogDispatcher {
    pub fn new() -> Self {
        Self
    }
}

impl Default for LogDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NotificationDispatcher for LogDispatcher {
    async fn notify(
        &self,
        monitor: &MonitorConfig,
        check: &CheckResult,
        transitioned: bool,
    ) -> Result<(), NotificationError> {
        info!(
            monitor_id = monitor.id,
            name = %monitor.name,
            status = %check.status(),
            transitioned,
            response_time_ms = check.response_time_ms,
            "monitor status notification"
        );
        Ok(())
    }
}
