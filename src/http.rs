use std::collections::BTreeMap;
use std::time::Duration;

use reqwest::header::HeaderMap;
use reqwest::{redirect::Policy, Client};
use tracing::{info, warn};

use crate::error::ReconError;
use crate::types::ReconReport;

pub const SCHEMES: [&str; 2] = ["http", "https"];

pub const SECURITY_HEADERS: [&str; 4] = [
    "Strict-Transport-Security",
    "X-Frame-Options",
    "X-Content-Type-Options",
    "Content-Security-Policy",
];

/// Client for header and body retrieval. Certificates are not validated.
pub fn build_client(timeout: Duration) -> Result<Client, ReconError> {
    let client = Client::builder()
        .timeout(timeout)
        .redirect(Policy::limited(10))
        .danger_accept_invalid_certs(true)
        .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
        .build()?;
    Ok(client)
}

/// GET `url` and return its response headers, keyed by lowercase name.
pub async fn fetch_headers(client: &Client, url: &str) -> Result<BTreeMap<String, String>, ReconError> {
    let resp = client.get(url).send().await?;
    Ok(header_map(resp.headers()))
}

/// GET `url` and return the decoded body.
pub async fn fetch_body(client: &Client, url: &str) -> Result<String, ReconError> {
    let resp = client.get(url).send().await?;
    Ok(resp.text().await?)
}

/// Flatten a header map; repeated headers are joined with `", "`.
pub fn header_map(headers: &HeaderMap) -> BTreeMap<String, String> {
    let mut out: BTreeMap<String, String> = BTreeMap::new();
    for (name, value) in headers {
        let value = String::from_utf8_lossy(value.as_bytes()).into_owned();
        out.entry(name.as_str().to_string())
            .and_modify(|v| {
                v.push_str(", ");
                v.push_str(&value);
            })
            .or_insert(value);
    }
    out
}

/// Security headers absent from `headers` (case-insensitive).
pub fn missing_security_headers(headers: &BTreeMap<String, String>) -> Vec<&'static str> {
    SECURITY_HEADERS
        .iter()
        .copied()
        .filter(|h| !headers.keys().any(|k| k.eq_ignore_ascii_case(h)))
        .collect()
}

/// Fetch headers over both schemes into `report.http_headers`.
pub async fn collect_headers(client: &Client, host: &str, report: &mut ReconReport) {
    info!(target = host, "retrieving http headers");
    for scheme in SCHEMES {
        let url = format!("{scheme}://{host}");
        match fetch_headers(client, &url).await {
            Ok(headers) => {
                info!(url = %url, count = headers.len(), "headers received");
                let missing = missing_security_headers(&headers);
                if !missing.is_empty() {
                    warn!(url = %url, missing = %missing.join(", "), "missing security headers");
                }
                report.http_headers.insert(scheme.to_string(), headers);
            }
            Err(e) => warn!(url = %url, error = %e, "header retrieval failed"),
        }
    }
}
