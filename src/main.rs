use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tracing::warn;

use recon_sweep::config::{Features, ReportFormat, RunConfig};
use recon_sweep::orchestrator::{Orchestrator, RunOutcome};
use recon_sweep::{logging, ports};

/// Scriptable first-pass reconnaissance of a single host.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "recon-sweep",
    version,
    about = "Subdomains, open TCP ports, banners and web fingerprints for one target, in one report.",
    long_about = None,
    after_help = "Examples:\n  recon-sweep -u example.com\n  recon-sweep -u example.com -p 1-1000 -t 20\n  recon-sweep -u example.com --no-subdomains -f json\n  recon-sweep -u example.com -w custom_wordlist.txt"
)]
struct Cli {
    /// Target domain or IP address.
    #[arg(short = 'u', long = "url")]
    target: String,

    /// Port range (e.g. 1-1000) or comma-separated ports (e.g. 80,443,8080).
    #[arg(short, long)]
    ports: Option<String>,

    /// Max concurrent probes.
    #[arg(short = 't', long = "threads", default_value_t = 10)]
    threads: usize,

    /// Wordlist for subdomain enumeration, one label per line.
    #[arg(short, long, default_value = "wordlists/subdomains.txt")]
    wordlist: PathBuf,

    /// Connection timeout in seconds.
    #[arg(long, default_value_t = 3)]
    timeout: u64,

    /// Report format.
    #[arg(short, long, value_enum, default_value_t = ReportFormat::Text)]
    format: ReportFormat,

    /// Directory the report file is written to.
    #[arg(short, long = "output-dir", default_value = "reports")]
    output_dir: PathBuf,

    /// How long an interrupted sweep waits for in-flight probes, in milliseconds.
    #[arg(long = "grace-ms", default_value_t = 2000)]
    grace_ms: u64,

    /// Debug-level logging.
    #[arg(short, long, default_value_t = false)]
    verbose: bool,

    /// Disable DNS enumeration.
    #[arg(long)]
    no_dns: bool,
    /// Disable subdomain enumeration.
    #[arg(long)]
    no_subdomains: bool,
    /// Disable port scanning.
    #[arg(long)]
    no_ports: bool,
    /// Disable banner grabbing.
    #[arg(long)]
    no_banners: bool,
    /// Disable HTTP header retrieval.
    #[arg(long)]
    no_http: bool,
    /// Disable technology detection.
    #[arg(long)]
    no_tech: bool,
    /// Disable WHOIS lookup.
    #[arg(long)]
    no_whois: bool,
}

impl Cli {
    fn into_config(self) -> Result<RunConfig> {
        let mut cfg = RunConfig::new(self.target.trim());
        if let Some(spec) = self.ports.as_deref() {
            cfg.ports = ports::parse_port_spec(spec)?;
        }
        cfg.workers = self.threads;
        cfg.wordlist = self.wordlist;
        cfg.timeout = Duration::from_secs(self.timeout);
        cfg.format = self.format;
        cfg.output_dir = Some(self.output_dir);
        cfg.grace = Duration::from_millis(self.grace_ms);
        cfg.features = Features {
            dns: !self.no_dns,
            subdomains: !self.no_subdomains,
            ports: !self.no_ports,
            banners: !self.no_banners,
            http: !self.no_http,
            tech: !self.no_tech,
            whois: !self.no_whois,
        };
        cfg.validate()?;
        Ok(cfg)
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    logging::init(cli.verbose)?;
    let config = cli.into_config()?;

    println!("recon-sweep configuration:");
    println!("  target       : {}", config.target);
    println!("  ports        : {}", config.ports.len());
    println!("  threads      : {}", config.workers);
    println!("  timeout      : {:?}", config.timeout);
    println!("  wordlist     : {}", config.wordlist.display());
    println!("  format       : {}", config.format);

    let orchestrator = Orchestrator::new(config);

    // Ctrl-C stops dispatch; the run still ends with a partial report.
    let cancel = orchestrator.cancel_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, finishing in-flight probes");
            cancel.cancel();
        }
    });

    let outcome = orchestrator.run().await;
    print_summary(&outcome);
    // Exit codes are 0..=255 by construction.
    Ok(ExitCode::from(outcome.status().exit_code() as u8))
}

fn print_summary(outcome: &RunOutcome) {
    let r = &outcome.report;
    let port_w = 5usize;
    let mut svc_w = "service".len();
    let mut banner_w = "banner".len();
    for p in &r.open_ports {
        svc_w = svc_w.max(p.service.len());
        if let Some(b) = r.banners.get(&p.port) {
            banner_w = banner_w.max(snippet(b).len());
        }
    }

    println!();
    println!("Status      : {}", r.status);
    println!("Subdomains  : {}", r.subdomains.len());
    println!("Open ports  : {}", r.open_ports.len());
    println!("Technologies: {}", r.technologies.len());
    if !r.open_ports.is_empty() {
        println!();
        println!(
            "{:>port_w$}  {:<svc_w$}  {:<banner_w$}",
            "port",
            "service",
            "banner",
            port_w = port_w,
            svc_w = svc_w,
            banner_w = banner_w
        );
        println!(
            "{:->port_w$}  {:-<svc_w$}  {:-<banner_w$}",
            "",
            "",
            "",
            port_w = port_w,
            svc_w = svc_w,
            banner_w = banner_w
        );
        for p in &r.open_ports {
            let b = r.banners.get(&p.port).map(|b| snippet(b)).unwrap_or_default();
            println!(
                "{:>port_w$}  {:<svc_w$}  {:<banner_w$}",
                p.port,
                p.service,
                b,
                port_w = port_w,
                svc_w = svc_w,
                banner_w = banner_w
            );
        }
    }
    for w in &r.warnings {
        println!("warning: {w}");
    }
    match &outcome.report_path {
        Some(path) => println!("\nReport saved: {}", path.display()),
        None => println!("\nNo report written."),
    }
}

/// First banner line, at most 60 characters.
fn snippet(banner: &str) -> String {
    banner.lines().next().unwrap_or("").chars().take(60).collect()
}
