use serde_json::json;
use tokio::sync::broadcast;
use tracing::debug;

use crate::models::{CheckResult, MonitorConfig};

/// Fan-out of monitor-update events to live subscribers (a WebSocket layer,
/// a dashboard, a test). Sending never blocks the check path; with no
/// subscribers the event is simply dropped.
#[derive(Clone)]
pub struct EventBroadcaster {
    tx: broadcast::Sender<String>,
}

impl EventBroadcaster {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<String> {
        self.tx.subscribe()
    }

    pub fn monitor_update(&self, monitor: &MonitorConfig, check: &CheckResult) {
        let message = json!({
            "type": "MONITOR_UPDATE",
            "payload": {
                "monitorId": monitor.id,
                "name": monitor.name,
                "status": check.status(),
                "isUp": check.is_up,
                "responseTimeMs": check.response_time_ms,
                "statusCode": check.status_code,
                "message": check.message,
                "timestamp": check.timestamp,
            },
        });

        if self.tx.send(message.to_string()).is_err() {
            debug!(monitor_id = monitor.id, "no event subscribers, update dropped");
        }
    }
}
