//! Lightweight service identification.
//!
//! A port is named from the banner it sent when the banner carries a known
//! greeting, and from the well-known port table otherwise.

use crate::banner::Banner;

/// Well-known TCP ports, sorted by port number for binary search.
const WELL_KNOWN_PORTS: &[(u16, &str)] = &[
    (7, "echo"),
    (21, "ftp"),
    (22, "ssh"),
    (23, "telnet"),
    (25, "smtp"),
    (53, "dns"),
    (80, "http"),
    (88, "kerberos"),
    (110, "pop3"),
    (111, "rpcbind"),
    (119, "nntp"),
    (135, "msrpc"),
    (139, "netbios-ssn"),
    (143, "imap"),
    (179, "bgp"),
    (389, "ldap"),
    (443, "https"),
    (445, "microsoft-ds"),
    (465, "smtps"),
    (514, "shell"),
    (587, "submission"),
    (631, "ipp"),
    (636, "ldaps"),
    (873, "rsync"),
    (993, "imaps"),
    (995, "pop3s"),
    (1080, "socks"),
    (1433, "mssql"),
    (1521, "oracle"),
    (1883, "mqtt"),
    (2049, "nfs"),
    (2181, "zookeeper"),
    (2375, "docker"),
    (3306, "mysql"),
    (3389, "rdp"),
    (5432, "postgresql"),
    (5672, "amqp"),
    (5900, "vnc"),
    (6379, "redis"),
    (6443, "kubernetes-api"),
    (8080, "http-proxy"),
    (8443, "https-alt"),
    (9092, "kafka"),
    (9200, "elasticsearch"),
    (11211, "memcached"),
    (27017, "mongodb"),
];

/// Banner prefixes that identify a service regardless of port.
const BANNER_SIGNATURES: &[(&str, &str)] = &[
    ("SSH-", "ssh"),
    ("HTTP/", "http"),
    ("+OK", "pop3"),
    ("* OK", "imap"),
    ("RFB ", "vnc"),
    ("-ERR", "redis"),
    ("-NOAUTH", "redis"),
    ("AMQP", "amqp"),
];

/// Look up the probable service name for a given port.
///
/// Returns `None` if the port is not in the well-known table.
pub fn service_name(port: u16) -> Option<&'static str> {
    WELL_KNOWN_PORTS
        .binary_search_by_key(&port, |&(p, _)| p)
        .ok()
        .map(|i| WELL_KNOWN_PORTS[i].1)
}

/// Guess a service from the first bytes it sent.
pub fn service_from_banner(banner: &Banner) -> Option<&'static str> {
    if let Some(text) = banner.as_text() {
        if let Some(&(_, name)) = BANNER_SIGNATURES
            .iter()
            .find(|(prefix, _)| text.starts_with(prefix))
        {
            return Some(name);
        }
        // FTP and SMTP both greet with 220; the text usually says which.
        if text.starts_with("220") {
            let lower = text.to_ascii_lowercase();
            if lower.contains("smtp") || lower.contains("mail") {
                return Some("smtp");
            }
            return Some("ftp");
        }
    }

    // MySQL greets with a length-prefixed packet whose payload starts with
    // protocol version 10. The salt may or may not decode as UTF-8.
    let bytes = banner.as_bytes();
    if bytes.len() > 4 && bytes[4] == 0x0a {
        return Some("mysql");
    }
    None
}

/// Name the service on a port, preferring what its banner says.
///
/// Returns "unknown" when neither the banner nor the port is recognized.
pub fn identify(port: u16, banner: Option<&Banner>) -> &'static str {
    banner
        .and_then(service_from_banner)
        .or_else(|| service_name(port))
        .unwrap_or("unknown")
}
