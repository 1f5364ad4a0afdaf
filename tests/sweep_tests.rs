mod common;

use std::io::Write;
use std::net::{IpAddr, Ipv4Addr};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use recon_sweep::banner;
use recon_sweep::error::ProbeError;
use recon_sweep::pool::{PoolConfig, Probe};
use recon_sweep::resolver::Target;
use recon_sweep::scanner::{self, TcpConnectProbe};
use recon_sweep::subdomains;
use recon_sweep::types::{CampaignStatus, ProbeInput, ReconReport};
use tokio_util::sync::CancellationToken;

use common::{closed_port, greeting_server, silent_server, StaticResolver};

const LOCALHOST: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);

fn pool(concurrency: usize) -> PoolConfig {
    PoolConfig {
        concurrency,
        probe_timeout: Duration::from_secs(2),
        grace: Duration::from_millis(300),
    }
}

fn local_target(ports: Vec<u16>) -> Target {
    Target {
        host: "127.0.0.1".into(),
        ip: LOCALHOST,
        ports,
        timeout: Duration::from_millis(300),
    }
}

#[tokio::test]
async fn port_sweep_reports_only_listening_ports() {
    let open = silent_server().await;
    let ports = vec![closed_port().await, open, closed_port().await];
    let mut report = ReconReport::new("127.0.0.1");

    let probe = Arc::new(TcpConnectProbe::new(LOCALHOST, Duration::from_millis(500)));
    let status = scanner::sweep_ports(probe, &ports, pool(3), CancellationToken::new(), &mut report).await;

    assert_eq!(status, CampaignStatus::Completed);
    assert_eq!(report.open_port_numbers(), vec![open]);
}

#[tokio::test]
async fn repeated_port_sweep_finds_same_ports() {
    let first_open = silent_server().await;
    let second_open = silent_server().await;
    let target = local_target(vec![first_open, closed_port().await, second_open, closed_port().await]);

    let mut runs = Vec::new();
    for _ in 0..2 {
        let mut report = ReconReport::new("127.0.0.1");
        let status = scanner::sweep_target_ports(&target, pool(2), CancellationToken::new(), &mut report).await;
        assert_eq!(status, CampaignStatus::Completed);
        let mut found = report.open_port_numbers();
        found.sort_unstable();
        runs.push(found);
    }

    let mut expected = vec![first_open, second_open];
    expected.sort_unstable();
    assert_eq!(runs[0], expected);
    assert_eq!(runs[1], runs[0]);
}

#[tokio::test]
async fn sweeping_twice_into_one_report_does_not_duplicate() {
    let open = silent_server().await;
    let target = local_target(vec![open, closed_port().await]);
    let mut report = ReconReport::new("127.0.0.1");

    for _ in 0..2 {
        scanner::sweep_target_ports(&target, pool(2), CancellationToken::new(), &mut report).await;
    }
    assert_eq!(report.open_port_numbers(), vec![open]);
}

/// Ports 1..=5 answer immediately; everything else hangs.
struct FastLowPorts;

#[async_trait]
impl Probe for FastLowPorts {
    async fn probe(&self, input: &ProbeInput) -> Result<Option<String>, ProbeError> {
        match input {
            ProbeInput::Port(p) if *p <= 5 => Ok(Some("fast".into())),
            _ => {
                tokio::time::sleep(Duration::from_secs(30)).await;
                Ok(Some("slow".into()))
            }
        }
    }
}

#[tokio::test]
async fn interrupted_port_sweep_keeps_partial_results() {
    let mut ports: Vec<u16> = (1..=5).collect();
    ports.extend(100..=120);
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        trigger.cancel();
    });

    let cfg = PoolConfig {
        concurrency: 8,
        probe_timeout: Duration::from_secs(60),
        grace: Duration::from_millis(100),
    };
    let mut report = ReconReport::new("test");
    let start = Instant::now();
    let status = scanner::sweep_ports(Arc::new(FastLowPorts), &ports, cfg, cancel, &mut report).await;

    assert!(start.elapsed() < Duration::from_secs(2));
    assert_eq!(status, CampaignStatus::Interrupted);
    let mut found = report.open_port_numbers();
    found.sort_unstable();
    assert_eq!(found, vec![1, 2, 3, 4, 5]);
}

#[tokio::test]
async fn subdomain_sweep_keeps_resolving_names() {
    let resolver = StaticResolver::default()
        .with("www.example.com", "93.184.216.34")
        .with("mail.example.com", "93.184.216.35");
    let labels = vec!["www".to_string(), "mail".to_string(), "doesnotexist123".to_string()];
    let mut report = ReconReport::new("example.com");

    let status = subdomains::sweep_labels(
        "example.com",
        labels,
        Arc::new(resolver),
        pool(2),
        CancellationToken::new(),
        &mut report,
    )
    .await;

    assert_eq!(status, CampaignStatus::Completed);
    let mut found = report.subdomains.clone();
    found.sort();
    assert_eq!(found, vec!["mail.example.com", "www.example.com"]);
}

#[tokio::test]
async fn subdomain_sweep_reads_wordlist_file() {
    let mut file = tempfile::NamedTempFile::new().expect("temp file");
    writeln!(file, "www\n\n  WWW \napi\n").expect("write wordlist");
    let resolver = StaticResolver::default()
        .with("www.example.org", "10.0.0.1")
        .with("api.example.org", "10.0.0.2");
    let mut report = ReconReport::new("example.org");

    let status = subdomains::sweep_subdomains(
        "example.org",
        file.path(),
        Arc::new(resolver),
        pool(4),
        CancellationToken::new(),
        &mut report,
    )
    .await;

    assert_eq!(status, CampaignStatus::Completed);
    assert_eq!(report.subdomains.len(), 2);
    assert!(report.warnings.is_empty());
}

#[tokio::test]
async fn missing_wordlist_aborts_only_the_campaign() {
    let mut report = ReconReport::new("example.com");
    let status = subdomains::sweep_subdomains(
        "example.com",
        Path::new("/nonexistent/words.txt"),
        Arc::new(StaticResolver::default()),
        pool(2),
        CancellationToken::new(),
        &mut report,
    )
    .await;

    assert_eq!(status, CampaignStatus::Aborted);
    assert!(report.subdomains.is_empty());
    assert_eq!(report.warnings.len(), 1);
    assert!(report.warnings[0].contains("/nonexistent/words.txt"));
}

#[tokio::test]
async fn banners_only_for_ports_that_talk() {
    let talking = greeting_server(b"SSH-2.0-OpenSSH_9.6\r\n").await;
    let quiet = silent_server().await;
    let closed = closed_port().await;
    let target = local_target(vec![talking, quiet, closed]);

    let mut report = ReconReport::new("127.0.0.1");
    report.add_open_port(talking, "unknown");
    report.add_open_port(quiet, "unknown");

    let status = banner::grab_banners(&target, &CancellationToken::new(), &mut report).await;

    assert_eq!(status, CampaignStatus::Completed);
    assert_eq!(report.banners.len(), 1);
    assert_eq!(report.banners.get(&talking).map(String::as_str), Some("SSH-2.0-OpenSSH_9.6"));
    assert!(report.banners.keys().all(|p| report.is_port_open(*p)));
}

#[tokio::test]
async fn banner_grab_stops_on_cancel() {
    let quiet = silent_server().await;
    let target = local_target(vec![quiet]);
    let mut report = ReconReport::new("127.0.0.1");
    report.add_open_port(quiet, "unknown");

    let cancel = CancellationToken::new();
    cancel.cancel();
    let status = banner::grab_banners(&target, &cancel, &mut report).await;

    assert_eq!(status, CampaignStatus::Interrupted);
    assert!(report.banners.is_empty());
}
