//! Library crate for recon-sweep: concurrent probe campaigns and the run orchestrator.
pub mod banner;
pub mod config;
pub mod dns;
pub mod error;
pub mod http;
pub mod logging;
pub mod orchestrator;
pub mod pool;
pub mod ports;
pub mod report;
pub mod resolver;
pub mod scanner;
pub mod subdomains;
pub mod tech;
pub mod types;
pub mod whois;
pub mod wordlist;
