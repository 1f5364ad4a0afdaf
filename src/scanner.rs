use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::net::TcpStream;
use tokio::time;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

use crate::error::ProbeError;
use crate::pool::{self, PoolConfig, Probe};
use crate::ports::service_name;
use crate::resolver::Target;
use crate::types::{CampaignStatus, ProbeInput, ReconReport};

/// Plain TCP connect check. The socket is closed as soon as it opens; no data
/// is exchanged.
#[derive(Debug, Clone)]
pub struct TcpConnectProbe {
    ip: IpAddr,
    timeout: Duration,
}

impl TcpConnectProbe {
    pub fn new(ip: IpAddr, timeout: Duration) -> Self {
        Self { ip, timeout }
    }

    pub fn for_target(target: &Target) -> Self {
        Self::new(target.ip, target.timeout)
    }
}

#[async_trait]
impl Probe for TcpConnectProbe {
    async fn probe(&self, input: &ProbeInput) -> Result<Option<String>, ProbeError> {
        let ProbeInput::Port(port) = *input else {
            return Err(ProbeError::Fault(format!("tcp probe cannot handle {input}")));
        };
        let addr = SocketAddr::new(self.ip, port);
        match time::timeout(self.timeout, TcpStream::connect(addr)).await {
            Ok(Ok(stream)) => {
                drop(stream);
                Ok(Some(service_name(port).to_string()))
            }
            // Refused, unreachable and timed out are all just "not open".
            Ok(Err(e)) => Err(ProbeError::Io(e)),
            Err(_) => Err(ProbeError::Timeout(self.timeout)),
        }
    }
}

/// Connect-scan `ports` with `probe` and append every open one to
/// `report.open_ports` in completion order.
#[instrument(skip_all, fields(ports = ports.len(), workers = config.concurrency))]
pub async fn sweep_ports<P>(
    probe: Arc<P>,
    ports: &[u16],
    config: PoolConfig,
    cancel: CancellationToken,
    report: &mut ReconReport,
) -> CampaignStatus
where
    P: Probe + ?Sized,
{
    let inputs = ports.iter().copied().map(ProbeInput::Port).collect();
    let mut outcomes = pool::run(inputs, probe, config, cancel);

    let mut scanned = 0usize;
    while let Some(outcome) = outcomes.next().await {
        scanned += 1;
        let ProbeInput::Port(port) = outcome.input else {
            continue;
        };
        if outcome.success {
            let service = outcome.metadata.unwrap_or_else(|| "unknown".to_string());
            info!(port, service = %service, "port open");
            report.add_open_port(port, service);
        } else if let Some(e) = &outcome.error {
            debug!(port, error = %e, "port not open");
        }
    }

    info!(scanned, open = report.open_ports.len(), "port sweep finished");
    if outcomes.was_cancelled() {
        CampaignStatus::Interrupted
    } else {
        CampaignStatus::Completed
    }
}

/// Port sweep over the target's configured ports with a plain TCP connect probe.
pub async fn sweep_target_ports(
    target: &Target,
    config: PoolConfig,
    cancel: CancellationToken,
    report: &mut ReconReport,
) -> CampaignStatus {
    info!(target = %target.host, ip = %target.ip, "starting port sweep");
    let probe = Arc::new(TcpConnectProbe::for_target(target));
    sweep_ports(probe, &target.ports, config, cancel, report).await
}
