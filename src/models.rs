use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Protocol used to probe a monitor's target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MonitorType {
    Http,
    Https,
    Tcp,
    Ping,
    Dns,
}

impl fmt::Display for MonitorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MonitorType::Http => "http",
            MonitorType::Https => "https",
            MonitorType::Tcp => "tcp",
            MonitorType::Ping => "ping",
            MonitorType::Dns => "dns",
        };
        f.write_str(s)
    }
}

impl FromStr for MonitorType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "http" => Ok(MonitorType::Http),
            "https" => Ok(MonitorType::Https),
            "tcp" => Ok(MonitorType::Tcp),
            "ping" => Ok(MonitorType::Ping),
            "dns" => Ok(MonitorType::Dns),
            other => Err(format!("unknown monitor type: {other}")),
        }
    }
}

/// Runtime status of a monitor. `Pending` is the only valid initial value;
/// status moves to `Up`/`Down` only on a completed check. `Maintenance` is
/// set externally and suspends transition logic without suspending checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum MonitorStatus {
    Up,
    Down,
    #[default]
    Pending,
    Maintenance,
}

impl fmt::Display for MonitorStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MonitorStatus::Up => "UP",
            MonitorStatus::Down => "DOWN",
            MonitorStatus::Pending => "PENDING",
            MonitorStatus::Maintenance => "MAINTENANCE",
        };
        f.write_str(s)
    }
}

fn default_interval_seconds() -> u64 {
    60
}

fn default_timeout_seconds() -> u64 {
    10
}

fn default_max_redirects() -> u32 {
    5
}

fn default_expected_status_codes() -> Vec<u16> {
    vec![200, 201, 202, 203, 204]
}

fn default_is_active() -> bool {
    true
}

/// Configuration snapshot of one monitored target.
///
/// Owned by the repository collaborator; the scheduler only ever sees an
/// immutable per-tick copy of it. `current_status` and `last_checked` are the
/// stored runtime state at snapshot time.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonitorConfig {
    pub id: i32,
    pub name: String,
    pub target: String,
    #[serde(rename = "type")]
    pub monitor_type: MonitorType,
    #[serde(default = "default_interval_seconds")]
    pub interval_seconds: u64,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
    #[serde(default = "default_max_redirects")]
    pub max_redirects: u32,
    #[serde(default = "default_expected_status_codes")]
    pub expected_status_codes: Vec<u16>,
    #[serde(default)]
    pub keyword: Option<String>,
    #[serde(default = "default_is_active")]
    pub is_active: bool,
    #[serde(default)]
    pub current_status: MonitorStatus,
    #[serde(default)]
    pub last_checked: Option<DateTime<Utc>>,
}

/// Outcome of one completed probe. Immutable once produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckResult {
    pub monitor_id: i32,
    pub timestamp: DateTime<Utc>,
    pub is_up: bool,
    /// Wall-clock time from submission to completion, retries included.
    pub response_time_ms: u64,
    pub status_code: Option<u16>,
    pub message: String,
    pub error_details: Option<String>,
}

impl CheckResult {
    pub fn from_outcome(
        monitor_id: i32,
        outcome: ProbeOutcome,
        response_time_ms: u64,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            monitor_id,
            timestamp,
            is_up: outcome.is_up,
            response_time_ms,
            status_code: outcome.status_code,
            message: outcome.message,
            error_details: outcome.error_details,
        }
    }

    pub fn failure(
        monitor_id: i32,
        response_time_ms: u64,
        timestamp: DateTime<Utc>,
        message: impl Into<String>,
        error_details: Option<String>,
    ) -> Self {
        Self {
            monitor_id,
            timestamp,
            is_up: false,
            response_time_ms,
            status_code: None,
            message: message.into(),
            error_details,
        }
    }

    pub fn status(&self) -> MonitorStatus {
        if self.is_up {
            MonitorStatus::Up
        } else {
            MonitorStatus::Down
        }
    }
}

/// What a probe executor reports back before the check runner stamps timing
/// and identity onto it. A definitive failure (wrong status code, missing
/// keyword) is expressed here with `is_up: false`, not as an error.
#[derive(Debug, Clone)]
pub struct ProbeOutcome {
    pub is_up: bool,
    pub status_code: Option<u16>,
    pub message: String,
    pub error_details: Option<String>,
}

impl ProbeOutcome {
    pub fn up(message: impl Into<String>) -> Self {
        Self {
            is_up: true,
            status_code: None,
            message: message.into(),
            error_details: None,
        }
    }

    pub fn down(message: impl Into<String>) -> Self {
        Self {
            is_up: false,
            status_code: None,
            message: message.into(),
            error_details: None,
        }
    }

    pub fn with_status_code(mut self, code: u16) -> Self {
        self.status_code = Some(code);
        self
    }

    pub fn with_error_details(mut self, details: impl Into<String>) -> Self {
        self.error_details = Some(details.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn monitor_type_parses_case_insensitively() {
        assert_eq!("HTTP".parse::<MonitorType>().unwrap(), MonitorType::Http);
        assert_eq!("ping".parse::<MonitorType>().unwrap(), MonitorType::Ping);
        assert!("gopher".parse::<MonitorType>().is_err());
    }

    #[test]
    fn check_result_round_trips_through_json() {
        let check = CheckResult {
            monitor_id: 7,
            timestamp: Utc::now(),
            is_up: true,
            response_time_ms: 134,
            status_code: Some(201),
            message: "HTTP check successful".to_string(),
            error_details: None,
        };

        let json = serde_json::to_string(&check).unwrap();
        let parsed: CheckResult = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed.is_up, check.is_up);
        assert_eq!(parsed.response_time_ms, check.response_time_ms);
        assert_eq!(parsed.status_code, check.status_code);
        assert_eq!(parsed.monitor_id, check.monitor_id);
    }

    #[test]
    fn monitor_config_defaults_apply() {
        let monitor: MonitorConfig = serde_json::from_value(serde_json::json!({
            "id": 1,
            "name": "example",
            "target": "https://example.com",
            "type": "https",
        }))
        .unwrap();

        assert_eq!(monitor.interval_seconds, 60);
        assert_eq!(monitor.timeout_seconds, 10);
        assert_eq!(monitor.expected_status_codes, vec![200, 201, 202, 203, 204]);
        assert_eq!(monitor.current_status, MonitorStatus::Pending);
        assert!(monitor.is_active);
    }
}
