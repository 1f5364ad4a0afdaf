use std::collections::BTreeMap;
use std::fmt;

use ::time::{format_description::well_known, OffsetDateTime};
use serde::{Deserialize, Serialize};

use crate::error::ProbeError;

/// One unit of work for the worker pool. A single pool run never mixes kinds.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ProbeInput {
    Port(u16),
    Label(String),
}

impl fmt::Display for ProbeInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProbeInput::Port(p) => write!(f, "port {p}"),
            ProbeInput::Label(l) => write!(f, "label {l}"),
        }
    }
}

/// Result of one probe. `metadata` is the service name for ports and the
/// fully-qualified name for subdomain labels.
#[derive(Debug)]
pub struct ProbeOutcome {
    pub input: ProbeInput,
    pub success: bool,
    pub metadata: Option<String>,
    pub error: Option<ProbeError>,
}

impl ProbeOutcome {
    pub fn from_result(input: ProbeInput, result: Result<Option<String>, ProbeError>) -> Self {
        match result {
            Ok(metadata) => Self {
                input,
                success: true,
                metadata,
                error: None,
            },
            Err(e) => Self {
                input,
                success: false,
                metadata: None,
                error: Some(e),
            },
        }
    }
}

/// One open TCP port discovered by the port sweep.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct OpenPort {
    pub port: u16,
    pub service: String,
}

/// How the run ended.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    #[default]
    Running,
    Completed,
    Interrupted,
    Failed,
}

impl RunStatus {
    /// Process exit code for this status.
    pub fn exit_code(self) -> i32 {
        match self {
            RunStatus::Running | RunStatus::Completed => 0,
            RunStatus::Failed => 1,
            RunStatus::Interrupted => 130,
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RunStatus::Running => "running",
            RunStatus::Completed => "completed",
            RunStatus::Interrupted => "interrupted",
            RunStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// How a single campaign ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CampaignStatus {
    Completed,
    /// Cancellation stopped dispatch; the report holds what finished first.
    Interrupted,
    /// A campaign-level failure; nothing was written.
    Aborted,
}

/// Registration data parsed from a WHOIS response.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct WhoisInfo {
    pub registrar: Option<String>,
    pub creation_date: Option<String>,
    pub expiration_date: Option<String>,
    pub name_servers: Vec<String>,
    pub status: Vec<String>,
    pub emails: Vec<String>,
    pub country: Option<String>,
}

impl WhoisInfo {
    pub fn is_empty(&self) -> bool {
        self.registrar.is_none()
            && self.creation_date.is_none()
            && self.expiration_date.is_none()
            && self.name_servers.is_empty()
            && self.status.is_empty()
            && self.emails.is_empty()
            && self.country.is_none()
    }
}

/// Everything one run found. Owned by the orchestrator; each campaign writes
/// only its own fields, and only from its collector loop.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct ReconReport {
    pub target: String,
    pub timestamp: String,
    pub status: RunStatus,
    pub dns_records: BTreeMap<String, Vec<String>>,
    pub subdomains: Vec<String>,
    pub open_ports: Vec<OpenPort>,
    pub banners: BTreeMap<u16, String>,
    pub http_headers: BTreeMap<String, BTreeMap<String, String>>,
    pub technologies: Vec<String>,
    pub whois_info: Option<WhoisInfo>,
    pub warnings: Vec<String>,
}

impl ReconReport {
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            timestamp: now_rfc3339(),
            ..Self::default()
        }
    }

    /// Append a resolved subdomain. Returns false for duplicates.
    pub fn add_subdomain(&mut self, fqdn: String) -> bool {
        if self.subdomains.iter().any(|s| s.eq_ignore_ascii_case(&fqdn)) {
            return false;
        }
        self.subdomains.push(fqdn);
        true
    }

    /// Append an open port in completion order. Returns false if already recorded.
    pub fn add_open_port(&mut self, port: u16, service: impl Into<String>) -> bool {
        if self.is_port_open(port) {
            return false;
        }
        self.open_ports.push(OpenPort {
            port,
            service: service.into(),
        });
        true
    }

    pub fn is_port_open(&self, port: u16) -> bool {
        self.open_ports.iter().any(|p| p.port == port)
    }

    pub fn open_port_numbers(&self) -> Vec<u16> {
        self.open_ports.iter().map(|p| p.port).collect()
    }

    /// Store a banner for an already-open port. Empty captures and ports not in
    /// `open_ports` are refused so `banners` keys stay a subset of the open set.
    pub fn record_banner(&mut self, port: u16, banner: &str) -> bool {
        let banner = banner.trim();
        if banner.is_empty() || !self.is_port_open(port) {
            return false;
        }
        self.banners.insert(port, banner.to_string());
        true
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }
}

/// RFC3339 UTC timestamp.
pub fn now_rfc3339() -> String {
    let now = OffsetDateTime::now_utc();
    now.format(&well_known::Rfc3339)
        .unwrap_or_else(|_| String::from("1970-01-01T00:00:00Z"))
}
