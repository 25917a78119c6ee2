//! Protocol-specific probe executors.
//!
//! Each executor performs a single network operation against a monitor's
//! target and reports a [`ProbeOutcome`]. Executors are pure with respect to
//! scheduler state: turning an outcome into a status transition is the status
//! evaluator's job.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

use crate::models::{MonitorConfig, MonitorType, ProbeOutcome};

pub mod dns;
pub mod http;
pub mod ping;
pub mod tcp;

pub use dns::DnsProbe;
pub use http::HttpProbe;
pub use ping::PingProbe;
pub use tcp::TcpProbe;

/// Transport-level probe failure. Definitive failures (wrong status code,
/// missing keyword, no addresses resolved) are not errors; they come back as
/// a `ProbeOutcome` with `is_up: false`.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("request timed out")]
    Timeout,
    #[error("connection failed: {0}")]
    Connect(String),
    #[error("name resolution failed: {0}")]
    Resolve(String),
    #[error("invalid target: {0}")]
    InvalidTarget(String),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("icmp error: {0}")]
    Icmp(String),
}

impl ProbeError {
    /// Whether the check runner may retry this failure. Only transient
    /// transport conditions qualify; a malformed target or an ICMP socket
    /// error will not get better on the next attempt.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ProbeError::Timeout | ProbeError::Connect(_) | ProbeError::Transport(_)
        )
    }
}

#[async_trait]
pub trait Probe: Send + Sync {
    async fn execute(&self, monitor: &MonitorConfig) -> Result<ProbeOutcome, ProbeError>;
}

/// Lookup table from monitor type to its probe executor.
pub struct ProbeRegistry {
    probes: HashMap<MonitorType, Arc<dyn Probe>>,
}

impl ProbeRegistry {
    pub fn new() -> Self {
        Self {
            probes: HashMap::new(),
        }
    }

    /// Registry covering every built-in monitor type.
    pub fn with_defaults(user_agent: &str) -> Self {
        let mut registry = Self::new();
        let http: Arc<dyn Probe> = Arc::new(HttpProbe::new(user_agent));
        registry.register(MonitorType::Http, Arc::clone(&http));
        registry.register(MonitorType::Https, http);
        registry.register(MonitorType::Tcp, Arc::new(TcpProbe::new()));
        registry.register(MonitorType::Ping, Arc::new(PingProbe::new()));
        registry.register(MonitorType::Dns, Arc::new(DnsProbe::new()));
        registry
    }

    pub fn register(&mut self, kind: MonitorType, probe: Arc<dyn Probe>) {
        self.probes.insert(kind, probe);
    }

    pub fn get(&self, kind: MonitorType) -> Option<Arc<dyn Probe>> {
        self.probes.get(&kind).cloned()
    }
}

impl Default for ProbeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Reduces a target like `https://example.com:8443/health`, `example.com:443`
/// or `example.com` to its host part.
pub(crate) fn host_of(target: &str) -> Result<String, ProbeError> {
    let stripped = target
        .split_once("://")
        .map_or(target, |(_, rest)| rest);
    let authority = stripped.split(['/', '?']).next().unwrap_or(stripped);
    let host = authority.rsplit_once(':').map_or(authority, |(h, port)| {
        // Only treat the suffix as a port if it is numeric; anything else is
        // part of the host (or already malformed and caught below).
        if port.chars().all(|c| c.is_ascii_digit()) && !port.is_empty() {
            h
        } else {
            authority
        }
    });

    if host.is_empty() {
        return Err(ProbeError::InvalidTarget(format!(
            "no host in target: {target}"
        )));
    }
    Ok(host.to_string())
}

/// Reduces a target to `host:port`, defaulting the port to 80 when the target
/// does not name one.
pub(crate) fn host_port_of(target: &str) -> Result<String, ProbeError> {
    let stripped = target
        .split_once("://")
        .map_or(target, |(_, rest)| rest);
    let authority = stripped.split(['/', '?']).next().unwrap_or(stripped);

    if authority.is_empty() {
        return Err(ProbeError::InvalidTarget(format!(
            "no host in target: {target}"
        )));
    }

    match authority.rsplit_once(':') {
        Some((_, port)) if !port.is_empty() && port.chars().all(|c| c.is_ascii_digit()) => {
            Ok(authority.to_string())
        }
        _ => Ok(format!("{authority}:80")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_of_strips_scheme_port_and_path() {
        assert_eq!(host_of("https://example.com:8443/health").unwrap(), "example.com");
        assert_eq!(host_of("example.com:53").unwrap(), "example.com");
        assert_eq!(host_of("example.com").unwrap(), "example.com");
        assert!(host_of("tcp://").is_err());
    }

    #[test]
    fn host_port_defaults_to_80() {
        assert_eq!(host_port_of("example.com").unwrap(), "example.com:80");
        assert_eq!(host_port_of("example.com:9090").unwrap(), "example.com:9090");
        assert_eq!(
            host_port_of("tcp://db.internal:5432").unwrap(),
            "db.internal:5432"
        );
    }

    #[test]
    fn transient_classification() {
        assert!(ProbeError::Timeout.is_transient());
        assert!(ProbeError::Connect("refused".into()).is_transient());
        assert!(!ProbeError::InvalidTarget("x".into()).is_transient());
        assert!(!ProbeError::Resolve("nxdomain".into()).is_transient());
    }
}
