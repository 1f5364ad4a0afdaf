use std::net::SocketAddr;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

use crate::error::ProbeError;
use crate::ports::is_web_port;
use crate::resolver::Target;
use crate::types::{CampaignStatus, ReconReport};

/// Most bytes read back from one port.
pub const BANNER_BYTES: usize = 1024;

/// Sequential banner capture over the ports already in `report.open_ports`.
/// Failures are skipped; nothing here aborts the run.
#[instrument(skip_all, fields(target = %target.host, open = report.open_ports.len()))]
pub async fn grab_banners(
    target: &Target,
    cancel: &CancellationToken,
    report: &mut ReconReport,
) -> CampaignStatus {
    for port in report.open_port_numbers() {
        if cancel.is_cancelled() {
            return CampaignStatus::Interrupted;
        }
        let addr = SocketAddr::new(target.ip, port);
        let grabbed = tokio::select! {
            res = grab_one(addr, &target.host, target.timeout) => res,
            _ = cancel.cancelled() => return CampaignStatus::Interrupted,
        };
        match grabbed {
            Ok(text) => {
                if report.record_banner(port, &text) {
                    info!(port, bytes = text.len(), "banner captured");
                }
            }
            Err(e) => debug!(port, error = %e, "no banner"),
        }
    }
    CampaignStatus::Completed
}

/// Connect, nudge web ports with a request line, and read one chunk.
/// The whole exchange is bounded by `timeout`.
pub async fn grab_one(addr: SocketAddr, host: &str, timeout: Duration) -> Result<String, ProbeError> {
    match time::timeout(timeout, exchange(addr, host)).await {
        Ok(res) => res,
        Err(_) => Err(ProbeError::Timeout(timeout)),
    }
}

async fn exchange(addr: SocketAddr, host: &str) -> Result<String, ProbeError> {
    let mut stream = TcpStream::connect(addr).await?;
    if is_web_port(addr.port()) {
        let request = format!("GET / HTTP/1.1\r\nHost: {host}\r\n\r\n");
        stream.write_all(request.as_bytes()).await?;
    }
    let mut buf = vec![0u8; BANNER_BYTES];
    let n = stream.read(&mut buf).await?;
    buf.truncate(n);
    Ok(decode_banner(&buf))
}

/// Lossy UTF-8 decode with surrounding whitespace stripped.
pub fn decode_banner(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).trim().to_string()
}
