use std::collections::HashSet;
use std::path::Path;

use crate::error::ReconError;

/// Split wordlist content into trimmed, non-empty, unique labels in file order.
pub fn parse_wordlist_str(s: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    s.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .filter(|l| seen.insert(l.to_ascii_lowercase()))
        .map(str::to_string)
        .collect()
}

/// Read a wordlist file. A missing or unreadable file aborts only the subdomain campaign.
pub async fn load_wordlist(path: impl AsRef<Path>) -> Result<Vec<String>, ReconError> {
    let path = path.as_ref();
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| ReconError::Wordlist {
            path: path.to_path_buf(),
            source,
        })?;
    Ok(parse_wordlist_str(&content))
}
