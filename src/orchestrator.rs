//! Run sequencing.
//!
//! Stages run strictly one after another:
//! `Dns -> Subdomains -> Ports -> Banners -> HttpHeaders -> TechDetect -> Whois -> Report`.
//! Each stage is optional per [`Features`]; an interrupt or a fatal condition
//! jumps straight to `Report`, which always runs.
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use reqwest::Client;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::banner;
use crate::config::{Features, RunConfig};
use crate::dns::{self, DnsVerdict, HickorySource, RecordSource};
use crate::http;
use crate::report;
use crate::resolver::{NameResolver, SystemResolver, Target};
use crate::scanner;
use crate::subdomains;
use crate::tech;
use crate::types::{CampaignStatus, ReconReport, RunStatus};
use crate::whois;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Dns,
    Subdomains,
    Ports,
    Banners,
    HttpHeaders,
    TechDetect,
    Whois,
    Report,
}

impl Stage {
    pub const SEQUENCE: [Stage; 8] = [
        Stage::Dns,
        Stage::Subdomains,
        Stage::Ports,
        Stage::Banners,
        Stage::HttpHeaders,
        Stage::TechDetect,
        Stage::Whois,
        Stage::Report,
    ];

    /// Whether this stage runs under `features`. `Report` always does.
    pub fn enabled(self, features: &Features) -> bool {
        match self {
            Stage::Dns => features.dns,
            Stage::Subdomains => features.subdomains,
            Stage::Ports => features.ports,
            Stage::Banners => features.banners,
            Stage::HttpHeaders => features.http,
            Stage::TechDetect => features.tech,
            Stage::Whois => features.whois,
            Stage::Report => true,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::Dns => "dns",
            Stage::Subdomains => "subdomains",
            Stage::Ports => "ports",
            Stage::Banners => "banners",
            Stage::HttpHeaders => "http_headers",
            Stage::TechDetect => "tech_detect",
            Stage::Whois => "whois",
            Stage::Report => "report",
        };
        f.write_str(s)
    }
}

/// What a stage tells the sequencer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Flow {
    Continue,
    /// Skip remaining network stages; the run is marked failed.
    ShortCircuit(String),
    Interrupted,
}

/// Final result of a run: the report and, when written, its path.
#[derive(Debug)]
pub struct RunOutcome {
    pub report: ReconReport,
    pub report_path: Option<PathBuf>,
}

impl RunOutcome {
    pub fn status(&self) -> RunStatus {
        self.report.status
    }
}

pub struct Orchestrator {
    config: RunConfig,
    resolver: Arc<dyn NameResolver>,
    records: Option<Arc<dyn RecordSource>>,
    cancel: CancellationToken,
    target: Option<Target>,
    http_client: Option<Client>,
}

impl Orchestrator {
    pub fn new(config: RunConfig) -> Self {
        Self {
            config,
            resolver: Arc::new(SystemResolver),
            records: None,
            cancel: CancellationToken::new(),
            target: None,
            http_client: None,
        }
    }

    pub fn with_resolver(mut self, resolver: Arc<dyn NameResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    /// Replace the DNS record source; the default queries upstream servers through hickory.
    pub fn with_records(mut self, records: Arc<dyn RecordSource>) -> Self {
        self.records = Some(records);
        self
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Run every enabled stage and always finish with the report.
    pub async fn run(mut self) -> RunOutcome {
        let mut report = ReconReport::new(self.config.target.clone());
        let mut status = RunStatus::Completed;
        info!(target = %self.config.target, "reconnaissance started");

        let resolved = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => None,
            r = Target::resolve(&self.config, self.resolver.as_ref()) => Some(r),
        };
        match resolved {
            None => status = RunStatus::Interrupted,
            Some(Ok(target)) => {
                info!(ip = %target.ip, "target resolved");
                self.target = Some(target);
            }
            Some(Err(e)) => {
                warn!(error = %e, "target address unavailable");
                report.warn(e.to_string());
            }
        }

        for stage in Stage::SEQUENCE {
            if stage == Stage::Report || status != RunStatus::Completed {
                break;
            }
            if !stage.enabled(&self.config.features) {
                continue;
            }
            if self.cancel.is_cancelled() {
                status = RunStatus::Interrupted;
                break;
            }
            info!(stage = %stage, "entering stage");
            let result = self.run_stage(stage, &mut report).await;
            status = settle(stage, result, &mut report);
        }

        report.status = status;
        let report_path = self.write_report(&mut report);
        info!(status = %report.status, "reconnaissance finished");
        RunOutcome { report, report_path }
    }

    /// Run one stage against a report that already holds earlier stages' findings.
    pub async fn run_stage(&mut self, stage: Stage, report: &mut ReconReport) -> Result<Flow> {
        let pool = self.config.pool_config();
        let flow = match stage {
            Stage::Dns => {
                let source = self.record_source();
                let ip = self.target.as_ref().map(|t| t.ip);
                let verdict = tokio::select! {
                    v = dns::collect_records(source.as_ref(), &self.config.target, ip, report) => v,
                    _ = self.cancel.cancelled() => return Ok(Flow::Interrupted),
                };
                match verdict {
                    DnsVerdict::NxDomain => Flow::ShortCircuit(format!(
                        "{} does not exist",
                        self.config.target
                    )),
                    DnsVerdict::Exists => Flow::Continue,
                }
            }
            Stage::Subdomains => {
                let status = subdomains::sweep_subdomains(
                    &self.config.target,
                    &self.config.wordlist,
                    Arc::clone(&self.resolver),
                    pool,
                    self.cancel.clone(),
                    report,
                )
                .await;
                flow_from(status)
            }
            Stage::Ports => {
                let Some(target) = self.target.as_ref() else {
                    return Ok(self.skip_unresolved(stage, report));
                };
                let status = scanner::sweep_target_ports(target, pool, self.cancel.clone(), report).await;
                flow_from(status)
            }
            Stage::Banners => {
                if report.open_ports.is_empty() {
                    info!("no open ports to grab banners from");
                    return Ok(Flow::Continue);
                }
                let Some(target) = self.target.as_ref() else {
                    return Ok(self.skip_unresolved(stage, report));
                };
                flow_from(banner::grab_banners(target, &self.cancel, report).await)
            }
            Stage::HttpHeaders => {
                let client = self.http_client()?;
                tokio::select! {
                    _ = http::collect_headers(&client, &self.config.target, report) => Flow::Continue,
                    _ = self.cancel.cancelled() => Flow::Interrupted,
                }
            }
            Stage::TechDetect => {
                let client = self.http_client()?;
                tokio::select! {
                    _ = tech::collect_technologies(&client, &self.config.target, report) => Flow::Continue,
                    _ = self.cancel.cancelled() => Flow::Interrupted,
                }
            }
            Stage::Whois => {
                tokio::select! {
                    _ = whois::collect_whois(&self.config.target, self.config.timeout, report) => Flow::Continue,
                    _ = self.cancel.cancelled() => Flow::Interrupted,
                }
            }
            Stage::Report => Flow::Continue,
        };
        Ok(flow)
    }

    /// Campaign-level abort for stages that need the target address.
    fn skip_unresolved(&self, stage: Stage, report: &mut ReconReport) -> Flow {
        warn!(stage = %stage, target = %self.config.target, "skipped, target address unavailable");
        report.warn(format!("{stage} skipped: {} does not resolve", self.config.target));
        Flow::Continue
    }

    fn record_source(&mut self) -> Arc<dyn RecordSource> {
        let timeout = self.config.timeout;
        Arc::clone(
            self.records
                .get_or_insert_with(|| Arc::new(HickorySource::new(timeout)) as Arc<dyn RecordSource>),
        )
    }

    fn http_client(&mut self) -> Result<Client> {
        if let Some(c) = &self.http_client {
            return Ok(c.clone());
        }
        let client = http::build_client(self.config.timeout)?;
        self.http_client = Some(client.clone());
        Ok(client)
    }

    fn write_report(&self, report: &mut ReconReport) -> Option<PathBuf> {
        let dir = self.config.output_dir.as_ref()?;
        match report::write_report(report, self.config.format, dir) {
            Ok(path) => {
                info!(path = %path.display(), format = %self.config.format, "report saved");
                Some(path)
            }
            Err(e) => {
                error!(error = %e, "failed to write report");
                report.status = RunStatus::Failed;
                report.warn(format!("report not written: {e:#}"));
                None
            }
        }
    }
}

/// Run status after a stage reports back. Anything but `Completed` ends the stage loop.
fn settle(stage: Stage, result: Result<Flow>, report: &mut ReconReport) -> RunStatus {
    match result {
        Ok(Flow::Continue) => RunStatus::Completed,
        Ok(Flow::Interrupted) => {
            warn!(stage = %stage, "interrupted, skipping to report");
            RunStatus::Interrupted
        }
        Ok(Flow::ShortCircuit(reason)) => {
            warn!(stage = %stage, reason = %reason, "skipping remaining network stages");
            report.warn(reason);
            RunStatus::Failed
        }
        Err(e) => {
            error!(stage = %stage, error = %e, "fatal error, skipping to report");
            report.warn(format!("fatal error during {stage}: {e:#}"));
            RunStatus::Failed
        }
    }
}

fn flow_from(status: CampaignStatus) -> Flow {
    match status {
        CampaignStatus::Interrupted => Flow::Interrupted,
        CampaignStatus::Completed | CampaignStatus::Aborted => Flow::Continue,
    }
}
