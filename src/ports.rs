use anyhow::{bail, Context, Result};
use std::collections::HashSet;

/// Ports that get a plaintext HTTP request line before the banner read.
pub const WEB_PORTS: &[u16] = &[80, 443, 8080, 8443];

/// Parse a port specification into a deduplicated list of TCP ports (1..=65535).
///
/// Supported forms, freely mixed and separated by commas or newlines:
/// - single port number: `80`
/// - inclusive range: `8000-8010`
/// - comments: everything after `#` on a line is ignored
///
/// Order of first appearance is preserved.
pub fn parse_port_spec(s: &str) -> Result<Vec<u16>> {
    let mut out: Vec<u16> = Vec::new();
    let mut seen = HashSet::new();

    for (idx, raw_line) in s.lines().enumerate() {
        let line_no = idx + 1;
        let line = raw_line.split('#').next().map(str::trim).unwrap_or("");

        for item in line.split(',').map(str::trim).filter(|i| !i.is_empty()) {
            if let Some((a, b)) = item.split_once('-') {
                let start = parse_port_str(a.trim())
                    .with_context(|| format!("line {line_no}: invalid start in range: {a}"))?;
                let end = parse_port_str(b.trim())
                    .with_context(|| format!("line {line_no}: invalid end in range: {b}"))?;
                if start > end {
                    bail!("line {line_no}: invalid range {start}-{end} (start > end)");
                }
                for p in start..=end {
                    if seen.insert(p) {
                        out.push(p);
                    }
                }
                continue;
            }

            let p = parse_port_str(item)
                .with_context(|| format!("line {line_no}: invalid port value: {item}"))?;
            if seen.insert(p) {
                out.push(p);
            }
        }
    }

    Ok(out)
}

/// The port list used when none is configured.
pub fn default_ports() -> Vec<u16> {
    const DEFAULT: &[u16] = &[
        21, 22, 23, 25, 53, 80, 110, 143, 443, 445, 3306, 3389, 8080, 8443,
    ];
    DEFAULT.to_vec()
}

/// Best-effort service name from a static table; `"unknown"` when absent.
pub fn service_name(port: u16) -> &'static str {
    match port {
        7 => "echo",
        20 => "ftp-data",
        21 => "ftp",
        22 => "ssh",
        23 => "telnet",
        25 => "smtp",
        53 => "domain",
        67 => "bootps",
        68 => "bootpc",
        69 => "tftp",
        79 => "finger",
        80 => "http",
        88 => "kerberos",
        110 => "pop3",
        111 => "sunrpc",
        119 => "nntp",
        123 => "ntp",
        135 => "epmap",
        137 => "netbios-ns",
        139 => "netbios-ssn",
        143 => "imap",
        161 => "snmp",
        179 => "bgp",
        389 => "ldap",
        443 => "https",
        445 => "microsoft-ds",
        465 => "submissions",
        514 => "shell",
        587 => "submission",
        631 => "ipp",
        636 => "ldaps",
        873 => "rsync",
        993 => "imaps",
        995 => "pop3s",
        1080 => "socks",
        1433 => "ms-sql-s",
        1521 => "oracle",
        1723 => "pptp",
        1883 => "mqtt",
        2049 => "nfs",
        2375 => "docker",
        3128 => "squid",
        3306 => "mysql",
        3389 => "ms-wbt-server",
        5060 => "sip",
        5432 => "postgresql",
        5672 => "amqp",
        5900 => "vnc",
        5985 => "wsman",
        6379 => "redis",
        6667 => "ircd",
        8080 => "http-alt",
        8443 => "https-alt",
        9092 => "kafka",
        9200 => "elasticsearch",
        11211 => "memcache",
        27017 => "mongodb",
        _ => "unknown",
    }
}

pub fn is_web_port(port: u16) -> bool {
    WEB_PORTS.contains(&port)
}

fn parse_port_str(s: &str) -> Result<u16> {
    let val: u32 = s.parse::<u32>().map_err(|e| anyhow::anyhow!(e))?;
    if val == 0 || val > 65535 {
        bail!("port out of range: {val}");
    }
    Ok(val as u16)
}
