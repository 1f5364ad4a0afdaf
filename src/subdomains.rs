use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::error::ProbeError;
use crate::pool::{self, PoolConfig, Probe};
use crate::resolver::NameResolver;
use crate::types::{CampaignStatus, ProbeInput, ReconReport};
use crate::wordlist;

/// Resolves `{label}.{domain}`; success means at least one address came back.
pub struct LabelProbe {
    domain: String,
    resolver: Arc<dyn NameResolver>,
}

impl LabelProbe {
    pub fn new(domain: impl Into<String>, resolver: Arc<dyn NameResolver>) -> Self {
        Self {
            domain: domain.into(),
            resolver,
        }
    }

    pub fn fqdn(&self, label: &str) -> String {
        format!("{}.{}", label.trim_end_matches('.'), self.domain.trim_start_matches('.'))
    }
}

#[async_trait]
impl Probe for LabelProbe {
    async fn probe(&self, input: &ProbeInput) -> Result<Option<String>, ProbeError> {
        let ProbeInput::Label(label) = input else {
            return Err(ProbeError::Fault(format!("label probe cannot handle {input}")));
        };
        let fqdn = self.fqdn(label);
        let addrs = self.resolver.resolve(&fqdn).await?;
        if addrs.is_empty() {
            return Err(ProbeError::NotFound(fqdn));
        }
        Ok(Some(fqdn))
    }
}

/// Resolve every label against `domain` and append resolving names to
/// `report.subdomains`.
#[instrument(skip_all, fields(domain = %domain, labels = labels.len()))]
pub async fn sweep_labels(
    domain: &str,
    labels: Vec<String>,
    resolver: Arc<dyn NameResolver>,
    config: PoolConfig,
    cancel: CancellationToken,
    report: &mut ReconReport,
) -> CampaignStatus {
    let probe = Arc::new(LabelProbe::new(domain, resolver));
    let inputs = labels.into_iter().map(ProbeInput::Label).collect();
    let mut outcomes = pool::run(inputs, probe, config, cancel);

    while let Some(outcome) = outcomes.next().await {
        match (outcome.success, outcome.metadata) {
            (true, Some(fqdn)) => {
                if report.add_subdomain(fqdn.clone()) {
                    info!(subdomain = %fqdn, "subdomain found");
                }
            }
            _ => {
                // Name-not-found is the common case, not an error.
                if let Some(e) = &outcome.error {
                    debug!(input = %outcome.input, error = %e, "candidate did not resolve");
                }
            }
        }
    }

    info!(found = report.subdomains.len(), "subdomain sweep finished");
    if outcomes.was_cancelled() {
        CampaignStatus::Interrupted
    } else {
        CampaignStatus::Completed
    }
}

/// Subdomain sweep driven by a wordlist file. An unreadable wordlist aborts
/// this campaign only.
pub async fn sweep_subdomains(
    domain: &str,
    wordlist_path: &Path,
    resolver: Arc<dyn NameResolver>,
    config: PoolConfig,
    cancel: CancellationToken,
    report: &mut ReconReport,
) -> CampaignStatus {
    let labels = match wordlist::load_wordlist(wordlist_path).await {
        Ok(labels) => labels,
        Err(e) => {
            warn!(error = %e, "skipping subdomain enumeration");
            report.warn(e.to_string());
            return CampaignStatus::Aborted;
        }
    };
    info!(candidates = labels.len(), "testing subdomain candidates");
    sweep_labels(domain, labels, resolver, config, cancel, report).await
}
