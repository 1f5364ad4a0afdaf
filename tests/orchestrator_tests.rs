mod common;

use std::io::Write;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use hickory_resolver::proto::rr::RecordType;
use recon_sweep::config::{Features, ReportFormat, RunConfig};
use recon_sweep::dns::RecordSource;
use recon_sweep::error::{DnsError, ProbeError};
use recon_sweep::orchestrator::{Flow, Orchestrator, Stage};
use recon_sweep::resolver::NameResolver;
use recon_sweep::types::{ReconReport, RunStatus};
use tokio_util::sync::CancellationToken;

use common::{closed_port, greeting_server, silent_server, StaticResolver};

/// Every name is NXDOMAIN.
struct NoSuchDomain;

#[async_trait]
impl RecordSource for NoSuchDomain {
    async fn lookup(&self, _host: &str, _rtype: RecordType) -> Result<Vec<String>, DnsError> {
        Err(DnsError::NxDomain)
    }

    async fn reverse(&self, _ip: IpAddr) -> Result<Vec<String>, DnsError> {
        Err(DnsError::NxDomain)
    }
}

/// Answers A queries with a fixed address; every other type is empty.
struct OnlyA(&'static str);

#[async_trait]
impl RecordSource for OnlyA {
    async fn lookup(&self, _host: &str, rtype: RecordType) -> Result<Vec<String>, DnsError> {
        if rtype == RecordType::A {
            Ok(vec![self.0.to_string()])
        } else {
            Err(DnsError::NoAnswer)
        }
    }

    async fn reverse(&self, _ip: IpAddr) -> Result<Vec<String>, DnsError> {
        Err(DnsError::NoAnswer)
    }
}

/// Never answers.
struct StuckResolver;

#[async_trait]
impl NameResolver for StuckResolver {
    async fn resolve(&self, _host: &str) -> Result<Vec<IpAddr>, ProbeError> {
        tokio::time::sleep(Duration::from_secs(60)).await;
        Ok(Vec::new())
    }
}

fn cancel_after(cancel: &CancellationToken, delay: Duration) {
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        trigger.cancel();
    });
}

fn local_config(ports: Vec<u16>) -> RunConfig {
    let mut cfg = RunConfig::new("127.0.0.1");
    cfg.ports = ports;
    cfg.timeout = Duration::from_millis(400);
    cfg.workers = 4;
    cfg.grace = Duration::from_millis(200);
    cfg.output_dir = None;
    cfg.features = Features {
        ports: true,
        banners: true,
        ..Features::none()
    };
    cfg
}

#[tokio::test]
async fn ports_and_banners_against_loopback() {
    let open = greeting_server(b"220 mail.test ESMTP ready\r\n").await;
    let closed = closed_port().await;

    let outcome = Orchestrator::new(local_config(vec![closed, open])).run().await;

    assert_eq!(outcome.status(), RunStatus::Completed);
    assert_eq!(outcome.status().exit_code(), 0);
    assert_eq!(outcome.report.open_port_numbers(), vec![open]);
    assert_eq!(
        outcome.report.banners.get(&open).map(String::as_str),
        Some("220 mail.test ESMTP ready")
    );
    assert!(outcome.report_path.is_none());
}

#[tokio::test]
async fn cancelled_before_start_still_returns_report() {
    let cancel = CancellationToken::new();
    cancel.cancel();
    let outcome = Orchestrator::new(local_config(vec![closed_port().await]))
        .with_cancel(cancel)
        .run()
        .await;

    assert_eq!(outcome.status(), RunStatus::Interrupted);
    assert_eq!(outcome.status().exit_code(), 130);
    assert!(outcome.report.open_ports.is_empty());
    assert_eq!(outcome.report.target, "127.0.0.1");
}

#[tokio::test]
async fn json_report_is_written_to_output_dir() {
    let dir = tempfile::tempdir().expect("temp dir");
    let mut cfg = local_config(vec![closed_port().await]);
    cfg.format = ReportFormat::Json;
    cfg.output_dir = Some(dir.path().join("out"));

    let outcome = Orchestrator::new(cfg).run().await;

    let path = outcome.report_path.expect("report written");
    assert!(path.starts_with(dir.path().join("out")));
    assert_eq!(path.extension().and_then(|e| e.to_str()), Some("json"));
    let body = std::fs::read_to_string(&path).expect("read report");
    let json: serde_json::Value = serde_json::from_str(&body).expect("valid json");
    assert_eq!(json["status"], "completed");
    assert_eq!(json["target"], "127.0.0.1");
}

#[tokio::test]
async fn unresolvable_target_skips_address_stages() {
    let mut cfg = local_config(vec![80]);
    cfg.target = "nothing-here.invalid".into();

    let outcome = Orchestrator::new(cfg)
        .with_resolver(Arc::new(StaticResolver::default()))
        .run()
        .await;

    assert_eq!(outcome.status(), RunStatus::Completed);
    assert!(outcome.report.open_ports.is_empty());
    assert!(outcome
        .report
        .warnings
        .iter()
        .any(|w| w.starts_with("ports skipped")));
}

#[tokio::test]
async fn subdomain_stage_uses_injected_resolver() {
    let mut words = tempfile::NamedTempFile::new().expect("temp file");
    writeln!(words, "www\nvpn\nnope").expect("write wordlist");

    let resolver = StaticResolver::default()
        .with("corp.test", "127.0.0.1")
        .with("www.corp.test", "127.0.0.1")
        .with("vpn.corp.test", "127.0.0.2");
    let mut cfg = local_config(Vec::new());
    cfg.target = "corp.test".into();
    cfg.wordlist = words.path().to_path_buf();
    cfg.features = Features {
        subdomains: true,
        ..Features::none()
    };

    let outcome = Orchestrator::new(cfg)
        .with_resolver(Arc::new(resolver))
        .run()
        .await;

    assert_eq!(outcome.status(), RunStatus::Completed);
    let mut found = outcome.report.subdomains.clone();
    found.sort();
    assert_eq!(found, vec!["vpn.corp.test", "www.corp.test"]);
}

#[tokio::test]
async fn banner_stage_with_no_open_ports_is_a_no_op() {
    let mut orchestrator = Orchestrator::new(local_config(vec![80]));
    let mut report = ReconReport::new("127.0.0.1");

    let flow = orchestrator
        .run_stage(Stage::Banners, &mut report)
        .await
        .expect("stage runs");

    assert_eq!(flow, Flow::Continue);
    assert!(report.banners.is_empty());
    assert!(report.warnings.is_empty());
}

#[tokio::test]
async fn disabled_stages_leave_report_empty() {
    let mut cfg = local_config(Vec::new());
    cfg.features = Features::none();

    let outcome = Orchestrator::new(cfg).run().await;

    assert_eq!(outcome.status(), RunStatus::Completed);
    let r = &outcome.report;
    assert!(r.dns_records.is_empty());
    assert!(r.subdomains.is_empty());
    assert!(r.open_ports.is_empty());
    assert!(r.http_headers.is_empty());
    assert!(r.whois_info.is_none());
}

#[tokio::test]
async fn interrupt_mid_run_keeps_ports_found_so_far() {
    let open = silent_server().await;
    let mut cfg = local_config(vec![closed_port().await, open]);
    // Long enough that the banner read on the silent port is still pending at cancel time.
    cfg.timeout = Duration::from_secs(5);

    let cancel = CancellationToken::new();
    cancel_after(&cancel, Duration::from_millis(400));

    let start = Instant::now();
    let outcome = Orchestrator::new(cfg).with_cancel(cancel).run().await;

    assert!(start.elapsed() < Duration::from_secs(3));
    assert_eq!(outcome.status(), RunStatus::Interrupted);
    assert_eq!(outcome.status().exit_code(), 130);
    assert_eq!(outcome.report.open_port_numbers(), vec![open]);
    assert!(outcome.report.banners.is_empty());
}

#[tokio::test]
async fn nxdomain_fails_run_and_skips_network_stages() {
    let open = silent_server().await;
    let dir = tempfile::tempdir().expect("temp dir");
    let mut cfg = local_config(vec![open]);
    cfg.target = "ghost.test".into();
    cfg.output_dir = Some(dir.path().to_path_buf());
    cfg.features = Features {
        dns: true,
        ports: true,
        banners: true,
        ..Features::none()
    };

    let outcome = Orchestrator::new(cfg)
        .with_resolver(Arc::new(StaticResolver::default().with("ghost.test", "127.0.0.1")))
        .with_records(Arc::new(NoSuchDomain))
        .run()
        .await;

    assert_eq!(outcome.status(), RunStatus::Failed);
    assert_eq!(outcome.status().exit_code(), 1);
    assert!(outcome.report.dns_records.is_empty());
    assert!(outcome.report.open_ports.is_empty());
    assert!(outcome.report.banners.is_empty());
    assert!(outcome
        .report
        .warnings
        .iter()
        .any(|w| w == "ghost.test does not exist"));

    let path = outcome.report_path.expect("report still written");
    let body = std::fs::read_to_string(path).expect("read report");
    assert!(body.contains("Status: failed"));
}

#[tokio::test]
async fn dns_stage_uses_injected_record_source() {
    let mut cfg = local_config(Vec::new());
    cfg.target = "corp.test".into();
    cfg.features = Features {
        dns: true,
        ..Features::none()
    };

    let outcome = Orchestrator::new(cfg)
        .with_resolver(Arc::new(StaticResolver::default().with("corp.test", "192.0.2.10")))
        .with_records(Arc::new(OnlyA("192.0.2.10")))
        .run()
        .await;

    assert_eq!(outcome.status(), RunStatus::Completed);
    assert_eq!(
        outcome.report.dns_records.get("A"),
        Some(&vec!["192.0.2.10".to_string()])
    );
    assert_eq!(outcome.report.dns_records.len(), 1);
}

#[tokio::test]
async fn cancel_during_target_lookup_returns_promptly() {
    let mut cfg = local_config(vec![80]);
    cfg.target = "slow.test".into();
    cfg.timeout = Duration::from_secs(10);

    let cancel = CancellationToken::new();
    cancel_after(&cancel, Duration::from_millis(100));

    let start = Instant::now();
    let outcome = Orchestrator::new(cfg)
        .with_resolver(Arc::new(StuckResolver))
        .with_cancel(cancel)
        .run()
        .await;

    assert!(start.elapsed() < Duration::from_secs(2));
    assert_eq!(outcome.status(), RunStatus::Interrupted);
    assert!(outcome.report.open_ports.is_empty());
}
