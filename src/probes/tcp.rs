use async_trait::async_trait;
use std::time::Duration;
use tokio::net::TcpStream;

use super::{host_port_of, Probe, ProbeError};
use crate::models::{MonitorConfig, ProbeOutcome};

/// Plain TCP connect probe. Success is an established connection within the
/// monitor's timeout; the stream is dropped immediately after.
pub struct TcpProbe;

impl TcpProbe {
    pub fn new() -> Self {
        Self
    }
}

impl Default for TcpProbe {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Probe for TcpProbe {
    async fn execute(&self, monitor: &MonitorConfig) -> Result<ProbeOutcome, ProbeError> {
        let addr = host_port_of(&monitor.target)?;
        let timeout = Duration::from_secs(monitor.timeout_seconds);

        match tokio::time::timeout(timeout, TcpStream::connect(&addr)).await {
            Ok(Ok(_stream)) => Ok(ProbeOutcome::up("TCP connection successful")),
            Ok(Err(e)) => Err(ProbeError::Connect(e.to_string())),
            Err(_) => Err(ProbeError::Timeout),
        }
    }
}
