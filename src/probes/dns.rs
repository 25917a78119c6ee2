use async_trait::async_trait;
use std::time::Duration;

use super::{host_of, Probe, ProbeError};
use crate::models::{MonitorConfig, ProbeOutcome};

/// Name-resolution probe. A resolver answer with no addresses, or a failed
/// lookup, is the definitive result for this monitor type rather than a
/// transport error: the host not resolving is exactly what the monitor is
/// watching for.
pub struct DnsProbe;

impl DnsProbe {
    pub fn new() -> Self {
        Self
    }
}

impl Default for DnsProbe {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Probe for DnsProbe {
    async fn execute(&self, monitor: &MonitorConfig) -> Result<ProbeOutcome, ProbeError> {
        let host = host_of(&monitor.target)?;
        let timeout = Duration::from_secs(monitor.timeout_seconds);

        let lookup = tokio::time::timeout(timeout, tokio::net::lookup_host((host.as_str(), 0u16)));
        match lookup.await {
            Err(_) => Err(ProbeError::Timeout),
            Ok(Err(e)) => {
                Ok(ProbeOutcome::down("DNS resolution failed").with_error_details(e.to_string()))
            }
            Ok(Ok(mut addrs)) => match addrs.next() {
                Some(addr) => Ok(ProbeOutcome::up(format!(
                    "DNS resolution successful: {}",
                    addr.ip()
                ))),
                None => Ok(ProbeOutcome::down("DNS resolution returned no addresses")),
            },
        }
    }
}
