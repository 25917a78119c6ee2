use async_trait::async_trait;
use rand::random;
use std::time::Duration;
use surge_ping::{PingIdentifier, PingSequence, SurgeError};

use super::{host_of, Probe, ProbeError};
use crate::models::{MonitorConfig, ProbeOutcome};

/// ICMP echo probe. The target host is resolved first; success is a reply
/// within the monitor's timeout.
///
/// Needs a raw/unprivileged ICMP socket, which not every environment grants;
/// a socket setup failure is reported as a non-transient `Icmp` error.
pub struct PingProbe;

impl PingProbe {
    pub fn new() -> Self {
        Self
    }
}

impl Default for PingProbe {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Probe for PingProbe {
    async fn execute(&self, monitor: &MonitorConfig) -> Result<ProbeOutcome, ProbeError> {
        let host = host_of(&monitor.target)?;
        let mut addrs = tokio::net::lookup_host((host.as_str(), 0u16))
            .await
            .map_err(|e| ProbeError::Resolve(e.to_string()))?;
        let ip = addrs
            .next()
            .ok_or_else(|| ProbeError::Resolve(format!("no addresses for {host}")))?
            .ip();

        let client = surge_ping::Client::new(&surge_ping::Config::default())
            .map_err(|e| ProbeError::Icmp(e.to_string()))?;
        let mut pinger = client.pinger(ip, PingIdentifier(random())).await;
        pinger.timeout(Duration::from_secs(monitor.timeout_seconds));

        match pinger.ping(PingSequence(0), &[]).await {
            Ok((_reply, rtt)) => Ok(ProbeOutcome::up(format!(
                "Host is reachable ({} ms)",
                rtt.as_millis()
            ))),
            Err(SurgeError::Timeout { .. }) => Err(ProbeError::Timeout),
            Err(e) => Err(ProbeError::Icmp(e.to_string())),
        }
    }
}
