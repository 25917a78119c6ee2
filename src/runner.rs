//! Executes a single check cycle for a monitor: probe selection, hard
//! deadline, and a bounded fixed-delay retry loop for transient failures.

use chrono::Utc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::debug;

use crate::models::{CheckResult, MonitorConfig, MonitorType, ProbeOutcome};
use crate::probes::{ProbeError, ProbeRegistry};

#[derive(Debug, Error)]
pub enum RunnerError {
    /// No probe executor registered for the monitor's type. This is a
    /// per-monitor configuration error: the caller logs it and skips the
    /// cycle instead of recording a failed check.
    #[error("no probe registered for monitor type {0}")]
    UnsupportedType(MonitorType),
}

pub struct CheckRunner {
    registry: ProbeRegistry,
    retry_attempts: u32,
    retry_backoff: Duration,
}

impl CheckRunner {
    pub fn new(registry: ProbeRegistry, retry_attempts: u32, retry_backoff: Duration) -> Self {
        Self {
            registry,
            retry_attempts,
            retry_backoff,
        }
    }

    /// Runs one check cycle and always produces a `CheckResult` once a probe
    /// exists for the monitor type. The monitor's timeout is a hard deadline
    /// over the whole cycle, retries included; expiry mid-retry yields a
    /// failed result, never an error.
    pub async fn run(&self, monitor: &MonitorConfig) -> Result<CheckResult, RunnerError> {
        let probe = self
            .registry
            .get(monitor.monitor_type)
            .ok_or(RunnerError::UnsupportedType(monitor.monitor_type))?;

        let timestamp = Utc::now();
        let started = Instant::now();
        let deadline = Duration::from_secs(monitor.timeout_seconds);

        let attempt_outcome =
            tokio::time::timeout(deadline, self.execute_with_retries(probe.as_ref(), monitor))
                .await;
        let response_time_ms = started.elapsed().as_millis() as u64;

        let result = match attempt_outcome {
            Ok(Ok(outcome)) => {
                CheckResult::from_outcome(monitor.id, outcome, response_time_ms, timestamp)
            }
            Ok(Err(e)) => CheckResult::failure(
                monitor.id,
                response_time_ms,
                timestamp,
                format!("Check failed: {e}"),
                Some(e.to_string()),
            ),
            Err(_) => CheckResult::failure(
                monitor.id,
                response_time_ms,
                timestamp,
                "Request timeout",
                None,
            ),
        };
        Ok(result)
    }

    async fn execute_with_retries(
        &self,
        probe: &dyn crate::probes::Probe,
        monitor: &MonitorConfig,
    ) -> Result<ProbeOutcome, ProbeError> {
        let mut attempt = 0u32;
        loop {
            match probe.execute(monitor).await {
                Ok(outcome) => return Ok(outcome),
                Err(e) if e.is_transient() && attempt < self.retry_attempts => {
                    attempt += 1;
                    debug!(
                        monitor_id = monitor.id,
                        attempt,
                        error = %e,
                        "transient probe failure, retrying"
                    );
                    tokio::time::sleep(self.retry_backoff).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MonitorStatus, ProbeOutcome};
    use crate::probes::Probe;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn monitor_with(monitor_type: MonitorType, timeout_seconds: u64) -> MonitorConfig {
        MonitorConfig {
            id: 9,
            name: "runner-test".to_string(),
            target: "irrelevant".to_string(),
            monitor_type,
            interval_seconds: 60,
            timeout_seconds,
            max_redirects: 5,
            expected_status_codes: vec![200],
            keyword: None,
            is_active: true,
            current_status: MonitorStatus::Pending,
            last_checked: None,
        }
    }

    /// Fails transiently `failures` times, then succeeds.
    struct FlakyProbe {
        calls: AtomicU32,
        failures: u32,
    }

    #[async_trait]
    impl Probe for FlakyProbe {
        async fn execute(&self, _monitor: &MonitorConfig) -> Result<ProbeOutcome, ProbeError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                Err(ProbeError::Connect("connection refused".into()))
            } else {
                Ok(ProbeOutcome::up("ok"))
            }
        }
    }

    struct DefinitiveDownProbe {
        calls: AtomicU32,
    }

    #[async_trait]
    impl Probe for DefinitiveDownProbe {
        async fn execute(&self, _monitor: &MonitorConfig) -> Result<ProbeOutcome, ProbeError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(ProbeOutcome::down("HTTP 404").with_status_code(404))
        }
    }

    struct HangingProbe;

    #[async_trait]
    impl Probe for HangingProbe {
        async fn execute(&self, _monitor: &MonitorConfig) -> Result<ProbeOutcome, ProbeError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(ProbeOutcome::up("unreachable"))
        }
    }

    fn registry_with(kind: MonitorType, probe: Arc<dyn Probe>) -> ProbeRegistry {
        let mut registry = ProbeRegistry::new();
        registry.register(kind, probe);
        registry
    }

    #[tokio::test(start_paused = true)]
    async fn retries_transient_failures_until_success() {
        let probe = Arc::new(FlakyProbe {
            calls: AtomicU32::new(0),
            failures: 2,
        });
        let runner = CheckRunner::new(
            registry_with(MonitorType::Tcp, probe.clone()),
            3,
            Duration::from_millis(500),
        );

        let check = runner
            .run(&monitor_with(MonitorType::Tcp, 30))
            .await
            .unwrap();

        assert!(check.is_up);
        assert_eq!(probe.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_retries_produce_a_failed_check() {
        let probe = Arc::new(FlakyProbe {
            calls: AtomicU32::new(0),
            failures: 10,
        });
        let runner = CheckRunner::new(
            registry_with(MonitorType::Tcp, probe.clone()),
            2,
            Duration::from_millis(500),
        );

        let check = runner
            .run(&monitor_with(MonitorType::Tcp, 30))
            .await
            .unwrap();

        assert!(!check.is_up);
        // Initial attempt plus two retries.
        assert_eq!(probe.calls.load(Ordering::SeqCst), 3);
        assert!(check.error_details.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn definitive_failures_are_not_retried() {
        let probe = Arc::new(DefinitiveDownProbe {
            calls: AtomicU32::new(0),
        });
        let runner = CheckRunner::new(
            registry_with(MonitorType::Http, probe.clone()),
            3,
            Duration::from_millis(500),
        );

        let check = runner
            .run(&monitor_with(MonitorType::Http, 30))
            .await
            .unwrap();

        assert!(!check.is_up);
        assert_eq!(check.status_code, Some(404));
        assert_eq!(probe.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_expiry_yields_a_timeout_result() {
        let runner = CheckRunner::new(
            registry_with(MonitorType::Http, Arc::new(HangingProbe)),
            3,
            Duration::from_millis(500),
        );

        let check = runner
            .run(&monitor_with(MonitorType::Http, 5))
            .await
            .unwrap();

        assert!(!check.is_up);
        assert_eq!(check.message, "Request timeout");
    }

    #[tokio::test]
    async fn unknown_type_is_a_configuration_error() {
        let runner = CheckRunner::new(ProbeRegistry::new(), 3, Duration::from_millis(500));
        let err = runner
            .run(&monitor_with(MonitorType::Dns, 5))
            .await
            .unwrap_err();
        assert!(matches!(err, RunnerError::UnsupportedType(MonitorType::Dns)));
    }
}
