//! Scan target resolution.
//!
//! Turns a hostname or literal IP string into a [`Target`] carrying a single
//! numeric address.

use crate::error::ResolveError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;
use tracing::debug;
use trust_dns_resolver::config::{ResolverConfig, ResolverOpts};
use trust_dns_resolver::TokioAsyncResolver;

/// A scan target that has been resolved to an IP address.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Target {
    /// The original input (hostname or IP string).
    pub original: String,
    /// The resolved IP address.
    pub ip: IpAddr,
}

impl Target {
    /// Create a new target from an already-known address.
    pub fn new(original: impl Into<String>, ip: IpAddr) -> Self {
        Self {
            original: original.into(),
            ip,
        }
    }
}

impl From<IpAddr> for Target {
    fn from(ip: IpAddr) -> Self {
        Self::new(ip.to_string(), ip)
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.original == self.ip.to_string() {
            write!(f, "{}", self.ip)
        } else {
            write!(f, "{} ({})", self.original, self.ip)
        }
    }
}

/// Resolve a hostname or IP literal into a [`Target`].
///
/// Literal addresses are used as-is. Hostnames go through the system resolver
/// configuration; when a name has several addresses the first one returned by
/// the resolver is used and the rest are ignored.
pub async fn resolve(name: &str) -> Result<Target, ResolveError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ResolveError::Empty);
    }

    if let Ok(ip) = name.parse::<IpAddr>() {
        return Ok(Target::new(name, ip));
    }

    if !is_valid_hostname(name) {
        return Err(ResolveError::InvalidFormat(name.to_string()));
    }

    let resolver = TokioAsyncResolver::tokio_from_system_conf().unwrap_or_else(|e| {
        debug!(error = %e, "system resolver config unavailable, using defaults");
        TokioAsyncResolver::tokio(ResolverConfig::default(), ResolverOpts::default())
    });

    let response = resolver
        .lookup_ip(name)
        .await
        .map_err(|e| ResolveError::Lookup {
            name: name.to_string(),
            reason: e.to_string(),
        })?;

    let ip = response
        .iter()
        .next()
        .ok_or_else(|| ResolveError::NoAddresses(name.to_string()))?;

    debug!(%name, %ip, "resolved target");
    Ok(Target::new(name, ip))
}

/// Check if a string is a valid hostname.
fn is_valid_hostname(s: &str) -> bool {
    if s.is_empty() || s.len() > 253 {
        return false;
    }

    let s = s.strip_suffix('.').unwrap_or(s);
    s.split('.').all(|label| {
        !label.is_empty()
            && label.len() <= 63
            && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
            && !label.starts_with('-')
            && !label.ends_with('-')
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{Ipv4Addr, Ipv6Addr};

    #[test]
    fn test_resolve_ipv4_literal() {
        let target = tokio_test::block_on(resolve("127.0.0.1")).unwrap();
        assert_eq!(target.ip, IpAddr::V4(Ipv4Addr::LOCALHOST));
        assert_eq!(target.to_string(), "127.0.0.1");
    }

    #[tokio::test]
    async fn test_resolve_ipv6_literal() {
        let target = resolve(" ::1 ").await.unwrap();
        assert_eq!(target.ip, IpAddr::V6(Ipv6Addr::LOCALHOST));
        assert_eq!(target.original, "::1");
    }

    #[tokio::test]
    async fn test_resolve_empty() {
        assert!(matches!(resolve("").await, Err(ResolveError::Empty)));
        assert!(matches!(resolve("   ").await, Err(ResolveError::Empty)));
    }

    #[tokio::test]
    async fn test_resolve_malformed() {
        assert!(matches!(
            resolve("not a host!").await,
            Err(ResolveError::InvalidFormat(_))
        ));
        assert!(matches!(
            resolve("-bad.example").await,
            Err(ResolveError::InvalidFormat(_))
        ));
    }

    #[test]
    fn test_valid_hostname() {
        assert!(is_valid_hostname("example.com"));
        assert!(is_valid_hostname("example.com."));
        assert!(is_valid_hostname("my-server"));
        assert!(!is_valid_hostname(""));
        assert!(!is_valid_hostname("-invalid.com"));
        assert!(!is_valid_hostname("a..b"));
    }

    #[test]
    fn test_target_display() {
        let target = Target::new("localhost", IpAddr::V4(Ipv4Addr::LOCALHOST));
        assert_eq!(target.to_string(), "localhost (127.0.0.1)");
    }
}
