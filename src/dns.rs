use std::net::IpAddr;
use std::time::Duration;

use async_trait::async_trait;
use hickory_resolver::config::{ResolverConfig, ResolverOpts};
use hickory_resolver::error::{ResolveError, ResolveErrorKind};
use hickory_resolver::proto::op::ResponseCode;
use hickory_resolver::proto::rr::RecordType;
use hickory_resolver::TokioAsyncResolver;
use tracing::{debug, info, warn};

use crate::error::DnsError;
use crate::types::ReconReport;

/// Forward record types queried for the target, in query order.
pub const RECORD_TYPES: [RecordType; 7] = [
    RecordType::A,
    RecordType::AAAA,
    RecordType::MX,
    RecordType::NS,
    RecordType::TXT,
    RecordType::SOA,
    RecordType::CNAME,
];

/// Whether the target name exists at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DnsVerdict {
    Exists,
    NxDomain,
}

/// Record lookups for the DNS stage.
#[async_trait]
pub trait RecordSource: Send + Sync + 'static {
    /// Rendered records of type `rtype` for `host`.
    async fn lookup(&self, host: &str, rtype: RecordType) -> Result<Vec<String>, DnsError>;

    /// PTR names for `ip`.
    async fn reverse(&self, ip: IpAddr) -> Result<Vec<String>, DnsError>;
}

/// Queries the system-default upstream servers through hickory.
pub struct HickorySource {
    resolver: TokioAsyncResolver,
}

impl HickorySource {
    pub fn new(timeout: Duration) -> Self {
        let mut opts = ResolverOpts::default();
        opts.timeout = timeout;
        opts.attempts = 1;
        Self {
            resolver: TokioAsyncResolver::tokio(ResolverConfig::default(), opts),
        }
    }
}

#[async_trait]
impl RecordSource for HickorySource {
    async fn lookup(&self, host: &str, rtype: RecordType) -> Result<Vec<String>, DnsError> {
        let lookup = self.resolver.lookup(host, rtype).await.map_err(classify)?;
        Ok(lookup
            .record_iter()
            .filter(|r| r.record_type() == rtype)
            .filter_map(|r| r.data())
            .map(|d| d.to_string())
            .collect())
    }

    async fn reverse(&self, ip: IpAddr) -> Result<Vec<String>, DnsError> {
        let names = self.resolver.reverse_lookup(ip).await.map_err(classify)?;
        Ok(names.iter().map(|n| n.to_string()).collect())
    }
}

fn classify(e: ResolveError) -> DnsError {
    match e.kind() {
        ResolveErrorKind::NoRecordsFound { response_code, .. } if *response_code == ResponseCode::NXDomain => {
            DnsError::NxDomain
        }
        ResolveErrorKind::NoRecordsFound { .. } => DnsError::NoAnswer,
        _ => DnsError::Query(e.to_string()),
    }
}

/// Query every record type for `host` and a PTR for `ip`, storing non-empty
/// answers in `report.dns_records`. NXDOMAIN stops the forward queries.
pub async fn collect_records(
    source: &dyn RecordSource,
    host: &str,
    ip: Option<IpAddr>,
    report: &mut ReconReport,
) -> DnsVerdict {
    info!(target = host, "starting dns enumeration");

    if host.parse::<IpAddr>().is_err() {
        for rtype in RECORD_TYPES {
            match source.lookup(host, rtype).await {
                Ok(records) if records.is_empty() => debug!(record_type = %rtype, "no records"),
                Ok(records) => {
                    info!(record_type = %rtype, count = records.len(), "records found");
                    report.dns_records.insert(rtype.to_string(), records);
                }
                Err(DnsError::NxDomain) => {
                    warn!(target = host, "domain does not exist");
                    return DnsVerdict::NxDomain;
                }
                Err(DnsError::NoAnswer) => debug!(record_type = %rtype, "no records"),
                Err(e) => warn!(record_type = %rtype, error = %e, "record query failed"),
            }
        }
    }

    if let Some(ip) = ip {
        match source.reverse(ip).await {
            Ok(ptr) if !ptr.is_empty() => {
                info!(count = ptr.len(), "ptr records found");
                report.dns_records.insert(RecordType::PTR.to_string(), ptr);
            }
            Ok(_) => debug!(%ip, "no ptr records"),
            Err(e) => warn!(%ip, error = %e, "ptr lookup failed"),
        }
    }

    DnsVerdict::Exists
}
