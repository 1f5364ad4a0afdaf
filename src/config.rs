use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Result};
use clap::ValueEnum;

use crate::pool::PoolConfig;
use crate::ports;

/// Which stages of the run are enabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Features {
    pub dns: bool,
    pub subdomains: bool,
    pub ports: bool,
    pub banners: bool,
    pub http: bool,
    pub tech: bool,
    pub whois: bool,
}

impl Default for Features {
    fn default() -> Self {
        Self {
            dns: true,
            subdomains: true,
            ports: true,
            banners: true,
            http: true,
            tech: true,
            whois: true,
        }
    }
}

impl Features {
    /// Everything off; handy for enabling a single stage.
    pub fn none() -> Self {
        Self {
            dns: false,
            subdomains: false,
            ports: false,
            banners: false,
            http: false,
            tech: false,
            whois: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum ReportFormat {
    #[default]
    Text,
    Json,
    Html,
}

impl ReportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ReportFormat::Text => "txt",
            ReportFormat::Json => "json",
            ReportFormat::Html => "html",
        }
    }
}

impl fmt::Display for ReportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ReportFormat::Text => "text",
            ReportFormat::Json => "json",
            ReportFormat::Html => "html",
        };
        f.write_str(s)
    }
}

/// Fully assembled run configuration. Validated once before the core starts.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub target: String,
    pub ports: Vec<u16>,
    pub timeout: Duration,
    pub workers: usize,
    pub wordlist: PathBuf,
    pub features: Features,
    pub format: ReportFormat,
    /// Where report files are written; `None` keeps the report in memory only.
    pub output_dir: Option<PathBuf>,
    /// How long a cancelled pool waits for in-flight probes.
    pub grace: Duration,
}

impl RunConfig {
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            ports: ports::default_ports(),
            timeout: Duration::from_secs(3),
            workers: 10,
            wordlist: PathBuf::from("wordlists/subdomains.txt"),
            features: Features::default(),
            format: ReportFormat::default(),
            output_dir: Some(PathBuf::from("reports")),
            grace: Duration::from_secs(2),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.target.trim().is_empty() {
            bail!("target must not be empty");
        }
        if self.target.chars().any(char::is_whitespace) {
            bail!("target must not contain whitespace: {:?}", self.target);
        }
        if self.workers == 0 {
            bail!("worker count must be at least 1");
        }
        if self.timeout.is_zero() {
            bail!("timeout must be greater than zero");
        }
        if self.features.ports && self.ports.is_empty() {
            bail!("port list is empty");
        }
        Ok(())
    }

    pub fn pool_config(&self) -> PoolConfig {
        PoolConfig {
            concurrency: self.workers,
            probe_timeout: self.timeout,
            grace: self.grace,
        }
    }
}
