use std::collections::{BTreeMap, BTreeSet};

use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Client;
use tracing::{debug, info};

use crate::http;
use crate::types::ReconReport;

/// (technology, body pattern) pairs, matched against the lowercased page body.
static BODY_PATTERNS: Lazy<Vec<(&'static str, Regex)>> = Lazy::new(|| {
    [
        ("WordPress", r"wp-content|wordpress"),
        ("Joomla", r"joomla"),
        ("Drupal", r"drupal"),
        ("React", r"react"),
        ("Angular", r"ng-|angular"),
        ("Vue.js", r"vue\.js|__vue"),
        ("jQuery", r"jquery"),
        ("Bootstrap", r"bootstrap"),
        ("PHP", r"\.php"),
    ]
    .into_iter()
    .filter_map(|(name, pat)| Regex::new(pat).ok().map(|re| (name, re)))
    .collect()
});

/// Header name to label prefix.
const HEADER_HINTS: [(&str, &str); 3] = [
    ("server", "Web Server"),
    ("x-powered-by", "Powered By"),
    ("x-aspnet-version", "ASP.NET"),
];

pub fn from_headers(headers: &BTreeMap<String, String>) -> Vec<String> {
    let mut out = Vec::new();
    for (header, label) in HEADER_HINTS {
        if let Some((_, value)) = headers.iter().find(|(k, _)| k.eq_ignore_ascii_case(header)) {
            out.push(format!("{label}: {value}"));
        }
    }
    out
}

pub fn from_body(body: &str) -> Vec<String> {
    let body = body.to_lowercase();
    BODY_PATTERNS
        .iter()
        .filter(|(_, re)| re.is_match(&body))
        .map(|(name, _)| name.to_string())
        .collect()
}

/// Sorted, de-duplicated technologies from every stored header set plus an optional body.
pub fn detect(
    header_sets: &BTreeMap<String, BTreeMap<String, String>>,
    body: Option<&str>,
) -> Vec<String> {
    let mut found: BTreeSet<String> = header_sets.values().flat_map(from_headers).collect();
    if let Some(body) = body {
        found.extend(from_body(body));
    }
    found.into_iter().collect()
}

/// Fill `report.technologies` from stored headers and the `http://` page body.
pub async fn collect_technologies(client: &Client, host: &str, report: &mut ReconReport) {
    info!(target = host, "detecting technologies");
    let url = format!("http://{host}");
    let body = match http::fetch_body(client, &url).await {
        Ok(body) => Some(body),
        Err(e) => {
            debug!(url = %url, error = %e, "page body unavailable");
            None
        }
    };
    report.technologies = detect(&report.http_headers, body.as_deref());
    info!(count = report.technologies.len(), "technology detection finished");
}
