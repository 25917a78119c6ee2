use async_trait::async_trait;
use reqwest::redirect::Policy;
use std::time::Duration;

use super::{Probe, ProbeError};
use crate::models::{MonitorConfig, ProbeOutcome};

/// GET-based probe for HTTP and HTTPS monitors.
///
/// A response within the timeout window is a definitive outcome: status codes
/// outside the monitor's expected set and missing body keywords are reported
/// as `is_up: false`, never as transport errors.
pub struct HttpProbe {
    user_agent: String,
}

impl HttpProbe {
    pub fn new(user_agent: &str) -> Self {
        Self {
            user_agent: user_agent.to_string(),
        }
    }

    fn client_for(&self, monitor: &MonitorConfig) -> Result<reqwest::Client, ProbeError> {
        reqwest::Client::builder()
            .timeout(Duration::from_secs(monitor.timeout_seconds))
            .redirect(Policy::limited(monitor.max_redirects as usize))
            .user_agent(&self.user_agent)
            .build()
            .map_err(|e| ProbeError::Transport(e.to_string()))
    }
}

fn map_reqwest_error(e: reqwest::Error) -> ProbeError {
    if e.is_timeout() {
        ProbeError::Timeout
    } else if e.is_connect() {
        ProbeError::Connect(e.to_string())
    } else if e.is_builder() || e.is_request() {
        ProbeError::InvalidTarget(e.to_string())
    } else {
        ProbeError::Transport(e.to_string())
    }
}

#[async_trait]
impl Probe for HttpProbe {
    async fn execute(&self, monitor: &MonitorConfig) -> Result<ProbeOutcome, ProbeError> {
        let client = self.client_for(monitor)?;
        let response = client
            .get(&monitor.target)
            .send()
            .await
            .map_err(map_reqwest_error)?;
        let status = response.status().as_u16();

        if !monitor.expected_status_codes.contains(&status) {
            return Ok(ProbeOutcome::down(format!("HTTP {status}"))
                .with_status_code(status)
                .with_error_details(format!(
                    "status {status} not in expected set {:?}",
                    monitor.expected_status_codes
                )));
        }

        if let Some(keyword) = monitor.keyword.as_deref().filter(|k| !k.trim().is_empty()) {
            let body = response.text().await.map_err(map_reqwest_error)?;
            if !body.contains(keyword) {
                return Ok(
                    ProbeOutcome::down(format!("Keyword not found: {keyword}"))
                        .with_status_code(status),
                );
            }
        }

        Ok(ProbeOutcome::up("HTTP check successful").with_status_code(status))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MonitorType;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn monitor_for(target: &str) -> MonitorConfig {
        MonitorConfig {
            id: 1,
            name: "http-test".to_string(),
            target: target.to_string(),
            monitor_type: MonitorType::Http,
            interval_seconds: 60,
            timeout_seconds: 10,
            max_redirects: 5,
            expected_status_codes: vec![200, 201, 202, 203, 204],
            keyword: None,
            is_active: true,
            current_status: Default::default(),
            last_checked: None,
        }
    }

    #[tokio::test]
    async fn accepts_status_in_expected_set() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(201))
            .mount(&server)
            .await;

        let mut monitor = monitor_for(&server.uri());
        monitor.expected_status_codes = vec![200, 201];

        let outcome = HttpProbe::new("upwatch-test")
            .execute(&monitor)
            .await
            .unwrap();
        assert!(outcome.is_up);
        assert_eq!(outcome.status_code, Some(201));
    }

    #[tokio::test]
    async fn reports_unexpected_status_as_down() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let monitor = monitor_for(&server.uri());
        let outcome = HttpProbe::new("upwatch-test")
            .execute(&monitor)
            .await
            .unwrap();

        assert!(!outcome.is_up);
        assert_eq!(outcome.status_code, Some(404));
        assert!(outcome.message.contains("404"));
    }

    #[tokio::test]
    async fn keyword_present_is_up_missing_is_down() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(200).set_body_string("service is healthy"))
            .mount(&server)
            .await;

        let mut monitor = monitor_for(&server.uri());
        monitor.keyword = Some("healthy".to_string());
        let outcome = HttpProbe::new("upwatch-test")
            .execute(&monitor)
            .await
            .unwrap();
        assert!(outcome.is_up);

        monitor.keyword = Some("definitely-absent".to_string());
        let outcome = HttpProbe::new("upwatch-test")
            .execute(&monitor)
            .await
            .unwrap();
        assert!(!outcome.is_up);
        assert!(outcome.message.contains("Keyword not found"));
    }

    #[tokio::test]
    async fn connection_refused_is_a_transient_error() {
        // Bind then drop a listener so the port is very likely closed.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let monitor = monitor_for(&format!("http://127.0.0.1:{port}/"));
        let err = HttpProbe::new("upwatch-test")
            .execute(&monitor)
            .await
            .unwrap_err();
        assert!(err.is_transient());
    }
}
