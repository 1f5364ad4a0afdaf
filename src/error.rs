use std::io;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Why a single probe came back negative.
///
/// These are data, not faults: they travel inside a `ProbeOutcome` and never
/// cross the worker pool boundary as an `Err`.
#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("i/o error: {0}")]
    Io(#[from] io::Error),

    #[error("name not found: {0}")]
    NotFound(String),

    #[error("probe fault: {0}")]
    Fault(String),
}

/// Campaign-level failure. Aborts one campaign, never the run.
#[derive(Error, Debug)]
pub enum ReconError {
    #[error("target {0} does not resolve")]
    Unresolved(String),

    #[error("wordlist {} unreadable: {source}", path.display())]
    Wordlist {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("whois lookup failed: {0}")]
    Whois(String),
}

/// Failure of one DNS record query.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DnsError {
    /// The queried name does not exist at all.
    #[error("domain does not exist")]
    NxDomain,

    /// The name exists but has no records of the queried type.
    #[error("no records")]
    NoAnswer,

    #[error("dns query failed: {0}")]
    Query(String),
}
