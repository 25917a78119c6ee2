use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use std::time::Duration;

use super::{NotificationDispatcher, NotificationError};
use crate::models::{CheckResult, MonitorConfig};

const SEND_TIMEOUT: Duration = Duration::from_secs(10);

/// Pushes status-change notifications to a configured webhook URL as a JSON
/// POST.
pub struct WebhookSender {
    client: Client,
    url: String,
}

impl WebhookSender {
    pub fn new(url: impl Into<String>) -> Result<Self, NotificationError> {
        let url = url.into();
        if url.trim().is_empty() {
            return Err(NotificationError::InvalidConfiguration(
                "webhook URL must not be empty".to_string(),
            ));
        }
        let client = Client::builder().timeout(SEND_TIMEOUT).build()?;
        Ok(Self { client, url })
    }
}

#[async_trait]
impl NotificationDispatcher for WebhookSender {
    async fn notify(
        &self,
        monitor: &MonitorConfig,
        check: &CheckResult,
        transitioned: bool,
    ) -> Result<(), NotificationError> {
        let status = check.status();
        let payload = json!({
            "monitorId": monitor.id,
            "monitorName": monitor.name,
            "monitorTarget": monitor.target,
            "status": status,
            "transitioned": transitioned,
            "responseTimeMs": check.response_time_ms,
            "statusCode": check.status_code,
            "message": format!("Monitor '{}' is now {}", monitor.name, status),
            "timestamp": check.timestamp,
        });

        let response = self.client.post(&self.url).json(&payload).send().await?;
        let http_status = response.status();
        if !http_status.is_success() {
            return Err(NotificationError::SendFailed(format!(
                "webhook returned non-success status: {http_status}"
            )));
        }
        Ok(())
    }
}
