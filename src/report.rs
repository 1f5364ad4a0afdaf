use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use ::time::{macros::format_description, OffsetDateTime};
use anyhow::{Context, Result};

use crate::config::ReportFormat;
use crate::types::ReconReport;

const RULE: &str = "------------------------------------------------------------";

/// Render `report` in the requested format.
pub fn render(report: &ReconReport, format: ReportFormat) -> Result<String> {
    match format {
        ReportFormat::Text => Ok(render_text(report)),
        ReportFormat::Json => render_json(report),
        ReportFormat::Html => Ok(render_html(report)),
    }
}

/// Render and write the report to `<dir>/recon_<target>_<stamp>.<ext>`,
/// creating `dir` when it does not exist.
pub fn write_report(report: &ReconReport, format: ReportFormat, dir: &Path) -> Result<PathBuf> {
    fs::create_dir_all(dir)
        .with_context(|| format!("failed to create report directory: {}", dir.display()))?;
    let path = report_path(dir, &report.target, format, OffsetDateTime::now_utc());
    let body = render(report, format)?;
    fs::write(&path, body).with_context(|| format!("failed to write report: {}", path.display()))?;
    Ok(path)
}

pub fn report_path(dir: &Path, target: &str, format: ReportFormat, at: OffsetDateTime) -> PathBuf {
    let stamp = at
        .format(format_description!("[year][month][day]_[hour][minute][second]"))
        .unwrap_or_else(|_| String::from("00000000_000000"));
    let safe: String = target
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '.' || c == '-' { c } else { '_' })
        .collect();
    dir.join(format!("recon_{safe}_{stamp}.{}", format.extension()))
}

pub fn render_json(report: &ReconReport) -> Result<String> {
    Ok(serde_json::to_string_pretty(report)?)
}

pub fn render_text(r: &ReconReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Reconnaissance Report");
    let _ = writeln!(out, "Target: {}", r.target);
    let _ = writeln!(out, "Timestamp: {}", r.timestamp);
    let _ = writeln!(out, "Status: {}", r.status);
    let _ = writeln!(out, "{}\n", "=".repeat(RULE.len()));

    section(&mut out, "DNS RECORDS");
    for (rtype, records) in &r.dns_records {
        let _ = writeln!(out, "{rtype}: {}", records.join(", "));
    }
    out.push('\n');

    section(&mut out, "SUBDOMAINS");
    for s in &r.subdomains {
        let _ = writeln!(out, "{s}");
    }
    out.push('\n');

    section(&mut out, "OPEN PORTS");
    for p in &r.open_ports {
        let _ = writeln!(out, "Port {} ({})", p.port, p.service);
    }
    out.push('\n');

    section(&mut out, "BANNERS");
    for (port, banner) in &r.banners {
        let _ = writeln!(out, "Port {port}:");
        for line in banner.lines() {
            let _ = writeln!(out, "    {line}");
        }
    }
    out.push('\n');

    section(&mut out, "HTTP HEADERS");
    for (scheme, headers) in &r.http_headers {
        let _ = writeln!(out, "[{scheme}]");
        for (k, v) in headers {
            let _ = writeln!(out, "    {k}: {v}");
        }
    }
    out.push('\n');

    section(&mut out, "TECHNOLOGIES");
    for t in &r.technologies {
        let _ = writeln!(out, "{t}");
    }
    out.push('\n');

    section(&mut out, "WHOIS");
    if let Some(w) = &r.whois_info {
        for (k, v) in whois_rows(w) {
            let _ = writeln!(out, "{k}: {v}");
        }
    }

    if !r.warnings.is_empty() {
        out.push('\n');
        section(&mut out, "WARNINGS");
        for w in &r.warnings {
            let _ = writeln!(out, "{w}");
        }
    }
    out
}

pub fn render_html(r: &ReconReport) -> String {
    let mut out = String::new();
    let _ = write!(
        out,
        r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="utf-8">
    <title>Recon Report - {target}</title>
    <style>
        body {{ font-family: Arial, sans-serif; margin: 20px; background: #f4f4f4; }}
        .container {{ max-width: 1200px; margin: 0 auto; background: white; padding: 20px; }}
        h1 {{ color: #333; border-bottom: 3px solid #4CAF50; padding-bottom: 10px; }}
        h2 {{ color: #4CAF50; margin-top: 30px; }}
        .info {{ background: #e8f5e9; padding: 15px; border-left: 4px solid #4CAF50; margin: 10px 0; }}
        .warning {{ background: #fff3cd; padding: 15px; border-left: 4px solid #ffc107; margin: 10px 0; }}
        table {{ width: 100%; border-collapse: collapse; margin: 15px 0; }}
        th, td {{ padding: 12px; text-align: left; border-bottom: 1px solid #ddd; vertical-align: top; }}
        th {{ background: #4CAF50; color: white; }}
        pre {{ white-space: pre-wrap; margin: 0; }}
        .port {{ display: inline-block; background: #4CAF50; color: white; padding: 5px 10px; margin: 5px; border-radius: 3px; }}
    </style>
</head>
<body>
    <div class="container">
        <h1>Reconnaissance Report</h1>
        <div class="info">
            <strong>Target:</strong> {target}<br>
            <strong>Scan Date:</strong> {ts}<br>
            <strong>Status:</strong> {status}<br>
        </div>
"#,
        target = escape_html(&r.target),
        ts = escape_html(&r.timestamp),
        status = r.status,
    );

    out.push_str("        <h2>DNS Records</h2>\n        <table>\n            <tr><th>Record Type</th><th>Values</th></tr>\n");
    for (rtype, records) in &r.dns_records {
        let _ = writeln!(
            out,
            "            <tr><td>{}</td><td>{}</td></tr>",
            escape_html(rtype),
            escape_html(&records.join(", "))
        );
    }
    out.push_str("        </table>\n");

    out.push_str("        <h2>Subdomains</h2>\n        <div class=\"info\">\n");
    for s in &r.subdomains {
        let _ = writeln!(out, "            {}<br>", escape_html(s));
    }
    out.push_str("        </div>\n");

    out.push_str("        <h2>Open Ports</h2>\n        <div>\n");
    for p in &r.open_ports {
        let _ = writeln!(
            out,
            "            <span class=\"port\">{} ({})</span>",
            p.port,
            escape_html(&p.service)
        );
    }
    out.push_str("        </div>\n");

    if !r.banners.is_empty() {
        out.push_str("        <h2>Banners</h2>\n        <table>\n            <tr><th>Port</th><th>Banner</th></tr>\n");
        for (port, banner) in &r.banners {
            let _ = writeln!(
                out,
                "            <tr><td>{port}</td><td><pre>{}</pre></td></tr>",
                escape_html(banner)
            );
        }
        out.push_str("        </table>\n");
    }

    for (scheme, headers) in &r.http_headers {
        let _ = writeln!(
            out,
            "        <h2>HTTP Headers ({})</h2>\n        <table>\n            <tr><th>Header</th><th>Value</th></tr>",
            escape_html(scheme)
        );
        for (k, v) in headers {
            let _ = writeln!(
                out,
                "            <tr><td>{}</td><td>{}</td></tr>",
                escape_html(k),
                escape_html(v)
            );
        }
        out.push_str("        </table>\n");
    }

    out.push_str("        <h2>Technologies</h2>\n        <div class=\"info\">\n");
    for t in &r.technologies {
        let _ = writeln!(out, "            {}<br>", escape_html(t));
    }
    out.push_str("        </div>\n");

    if let Some(w) = &r.whois_info {
        out.push_str("        <h2>WHOIS</h2>\n        <table>\n");
        for (k, v) in whois_rows(w) {
            let _ = writeln!(
                out,
                "            <tr><th>{}</th><td>{}</td></tr>",
                escape_html(k),
                escape_html(&v)
            );
        }
        out.push_str("        </table>\n");
    }

    if !r.warnings.is_empty() {
        out.push_str("        <h2>Warnings</h2>\n        <div class=\"warning\">\n");
        for w in &r.warnings {
            let _ = writeln!(out, "            {}<br>", escape_html(w));
        }
        out.push_str("        </div>\n");
    }

    out.push_str("    </div>\n</body>\n</html>\n");
    out
}

pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn section(out: &mut String, title: &str) {
    let _ = writeln!(out, "{title}\n{RULE}");
}

fn whois_rows(w: &crate::types::WhoisInfo) -> Vec<(&'static str, String)> {
    let mut rows = Vec::new();
    if let Some(v) = &w.registrar {
        rows.push(("registrar", v.clone()));
    }
    if let Some(v) = &w.creation_date {
        rows.push(("creation_date", v.clone()));
    }
    if let Some(v) = &w.expiration_date {
        rows.push(("expiration_date", v.clone()));
    }
    if !w.name_servers.is_empty() {
        rows.push(("name_servers", w.name_servers.join(", ")));
    }
    if !w.status.is_empty() {
        rows.push(("status", w.status.join(", ")));
    }
    if !w.emails.is_empty() {
        rows.push(("emails", w.emails.join(", ")));
    }
    if let Some(v) = &w.country {
        rows.push(("country", v.clone()));
    }
    rows
}
