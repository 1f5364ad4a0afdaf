use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time;
use tracing::{debug, info, warn};

use crate::error::ReconError;
use crate::types::{ReconReport, WhoisInfo};

pub const IANA_SERVER: &str = "whois.iana.org";
const WHOIS_PORT: u16 = 43;
const MAX_RESPONSE: u64 = 64 * 1024;

static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}").unwrap());

/// Send one WHOIS query to `server` and return the raw response.
pub async fn query(server: &str, query: &str, timeout: Duration) -> Result<String, ReconError> {
    let exchange = async {
        let mut stream = TcpStream::connect((server, WHOIS_PORT)).await?;
        stream.write_all(format!("{query}\r\n").as_bytes()).await?;
        let mut buf = Vec::new();
        stream.take(MAX_RESPONSE).read_to_end(&mut buf).await?;
        Ok::<_, std::io::Error>(buf)
    };
    match time::timeout(timeout, exchange).await {
        Ok(Ok(buf)) => Ok(String::from_utf8_lossy(&buf).into_owned()),
        Ok(Err(e)) => Err(ReconError::Whois(format!("{server}: {e}"))),
        Err(_) => Err(ReconError::Whois(format!("{server}: timed out after {timeout:?}"))),
    }
}

/// The registry server an IANA response points at, if any.
pub fn referral(response: &str) -> Option<String> {
    response.lines().find_map(|line| {
        let (key, value) = line.split_once(':')?;
        let key = key.trim().to_ascii_lowercase();
        let value = value.trim();
        ((key == "refer" || key == "whois") && !value.is_empty()).then(|| value.to_string())
    })
}

/// Pull registration fields out of a free-form WHOIS response.
pub fn parse(response: &str) -> WhoisInfo {
    let mut info = WhoisInfo::default();

    for line in response.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('%') || line.starts_with('#') || line.starts_with(">>>") {
            continue;
        }
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let key = key.trim().to_ascii_lowercase();
        let value = value.trim();
        if value.is_empty() {
            continue;
        }

        match key.as_str() {
            "registrar" => set_once(&mut info.registrar, value),
            "creation date" | "created" | "registered on" => set_once(&mut info.creation_date, value),
            "registry expiry date"
            | "registrar registration expiration date"
            | "expiration date"
            | "expiry date"
            | "paid-till" => set_once(&mut info.expiration_date, value),
            "name server" | "nserver" => push_unique(&mut info.name_servers, &value.to_ascii_lowercase()),
            "domain status" | "status" => {
                if let Some(code) = value.split_whitespace().next() {
                    push_unique(&mut info.status, code);
                }
            }
            "registrant country" | "country" => set_once(&mut info.country, value),
            _ => {}
        }
    }

    for m in EMAIL_RE.find_iter(response) {
        push_unique(&mut info.emails, &m.as_str().to_ascii_lowercase());
    }

    info
}

/// IANA query followed by the referred registry, when there is one.
pub async fn lookup(host: &str, timeout: Duration) -> Result<WhoisInfo, ReconError> {
    let iana = query(IANA_SERVER, host, timeout).await?;
    let response = match referral(&iana) {
        Some(server) => {
            debug!(server = %server, "following whois referral");
            query(&server, host, timeout).await?
        }
        None => iana,
    };
    Ok(parse(&response))
}

/// Informational only: failures are logged and leave `whois_info` empty.
pub async fn collect_whois(host: &str, timeout: Duration, report: &mut ReconReport) {
    info!(target = host, "performing whois lookup");
    match lookup(host, timeout).await {
        Ok(info) if !info.is_empty() => {
            info!(registrar = ?info.registrar, "whois information found");
            report.whois_info = Some(info);
        }
        Ok(_) => warn!(target = host, "whois response had no recognised fields"),
        Err(e) => warn!(error = %e, "whois lookup failed"),
    }
}

fn set_once(slot: &mut Option<String>, value: &str) {
    if slot.is_none() {
        *slot = Some(value.to_string());
    }
}

fn push_unique(list: &mut Vec<String>, value: &str) {
    if !list.iter().any(|v| v == value) {
        list.push(value.to_string());
    }
}
