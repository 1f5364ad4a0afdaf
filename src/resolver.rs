use std::io;
use std::net::IpAddr;
use std::time::Duration;

use async_trait::async_trait;
use tokio::net::lookup_host;
use tracing::debug;

use crate::config::RunConfig;
use crate::error::{ProbeError, ReconError};

/// Host name to address resolution.
#[async_trait]
pub trait NameResolver: Send + Sync + 'static {
    /// Every address `host` resolves to. An empty answer is reported as `NotFound`.
    async fn resolve(&self, host: &str) -> Result<Vec<IpAddr>, ProbeError>;
}

/// Resolution through the operating system resolver (getaddrinfo on the blocking pool).
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemResolver;

#[async_trait]
impl NameResolver for SystemResolver {
    async fn resolve(&self, host: &str) -> Result<Vec<IpAddr>, ProbeError> {
        let addrs = match lookup_host((host, 0)).await {
            Ok(addrs) => addrs,
            // getaddrinfo failures surface as uncategorised io errors; they all mean "no such name"
            Err(e) if e.kind() != io::ErrorKind::TimedOut => {
                debug!(host, error = %e, "name did not resolve");
                return Err(ProbeError::NotFound(host.to_string()));
            }
            Err(e) => return Err(ProbeError::Io(e)),
        };
        let mut ips: Vec<IpAddr> = addrs.map(|sa| sa.ip()).collect();
        ips.dedup();
        if ips.is_empty() {
            return Err(ProbeError::NotFound(host.to_string()));
        }
        Ok(ips)
    }
}

/// The scan target, resolved once at run start and read-only afterwards.
#[derive(Debug, Clone)]
pub struct Target {
    pub host: String,
    pub ip: IpAddr,
    pub ports: Vec<u16>,
    pub timeout: Duration,
}

impl Target {
    /// Resolve `config.target`, preferring an IPv4 address. IP literals skip the lookup.
    pub async fn resolve(
        config: &RunConfig,
        resolver: &dyn NameResolver,
    ) -> Result<Self, ReconError> {
        let host = config.target.trim().to_string();
        let ip = match host.parse::<IpAddr>() {
            Ok(ip) => ip,
            Err(_) => {
                let ips = tokio::time::timeout(config.timeout, resolver.resolve(&host))
                    .await
                    .map_err(|_| ReconError::Unresolved(host.clone()))?
                    .map_err(|_| ReconError::Unresolved(host.clone()))?;
                pick_address(&ips).ok_or_else(|| ReconError::Unresolved(host.clone()))?
            }
        };
        Ok(Self {
            host,
            ip,
            ports: config.ports.clone(),
            timeout: config.timeout,
        })
    }
}

fn pick_address(ips: &[IpAddr]) -> Option<IpAddr> {
    ips.iter()
        .find(|ip| ip.is_ipv4())
        .or_else(|| ips.first())
        .copied()
}
