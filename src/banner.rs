//! Banner grabbing for open TCP ports.
//!
//! Reads whatever the service sends first after the handshake. Nothing is
//! ever written to the service.

use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::time::timeout;
use tracing::trace;

/// Maximum bytes to read for a banner.
pub const MAX_BANNER_SIZE: usize = 1024;

/// The first bytes a service sent after connect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "lowercase")]
pub enum Banner {
    /// The bytes decoded as UTF-8 text.
    Text(String),
    /// The bytes were not valid UTF-8; kept raw.
    Binary(Vec<u8>),
}

impl Banner {
    /// Classify raw bytes as text or binary.
    ///
    /// Leading and trailing CR/LF are stripped from text banners.
    pub fn from_bytes(data: &[u8]) -> Self {
        match std::str::from_utf8(data) {
            Ok(text) => Self::Text(text.trim_matches(&['\r', '\n'][..]).to_string()),
            Err(e) => {
                trace!(error = %e, len = data.len(), "banner is not valid UTF-8");
                Self::Binary(data.to_vec())
            }
        }
    }

    /// The decoded text, if any.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            Self::Binary(_) => None,
        }
    }

    /// The raw bytes as received (text banners are already trimmed).
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::Text(s) => s.as_bytes(),
            Self::Binary(b) => b,
        }
    }

    /// Single-line rendering for tables and CSV.
    pub fn display(&self) -> Cow<'_, str> {
        match self {
            Self::Text(s) => Cow::Owned(sanitize(s)),
            Self::Binary(b) => Cow::Owned(format!("<{} bytes undecodable>", b.len())),
        }
    }
}

impl fmt::Display for Banner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display())
    }
}

/// Read a banner from a connected stream.
///
/// Performs a single read of up to [`MAX_BANNER_SIZE`] bytes bounded by
/// `read_timeout`. Returns `None` on timeout, EOF or read error.
pub async fn read_banner<S>(stream: &mut S, read_timeout: Duration) -> Option<Banner>
where
    S: AsyncRead + Unpin,
{
    let mut buffer = [0u8; MAX_BANNER_SIZE];

    match timeout(read_timeout, stream.read(&mut buffer)).await {
        Ok(Ok(n)) if n > 0 => Some(Banner::from_bytes(&buffer[..n])),
        Ok(Ok(_)) => None,
        Ok(Err(e)) => {
            trace!(error = %e, "banner read failed");
            None
        }
        Err(_) => None,
    }
}

/// Replace control characters and collapse whitespace runs.
fn sanitize(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut prev_space = false;
    for c in s.chars() {
        let c = if c.is_whitespace() {
            ' '
        } else if c.is_control() {
            '.'
        } else {
            c
        };
        if c == ' ' {
            if !prev_space {
                result.push(c);
            }
            prev_space = true;
        } else {
            result.push(c);
            prev_space = false;
        }
    }
    result.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_banner_is_trimmed() {
        let banner = Banner::from_bytes(b"SSH-2.0-OpenSSH_8.9\r\n");
        assert_eq!(banner, Banner::Text("SSH-2.0-OpenSSH_8.9".to_string()));
        assert_eq!(banner.as_text(), Some("SSH-2.0-OpenSSH_8.9"));
    }

    #[test]
    fn test_binary_banner_is_kept_raw() {
        let banner = Banner::from_bytes(&[0xff, 0xfe, 0x00, 0x01]);
        assert_eq!(banner, Banner::Binary(vec![0xff, 0xfe, 0x00, 0x01]));
        assert_eq!(banner.as_text(), None);
        assert_eq!(banner.display(), "<4 bytes undecodable>");
    }

    #[test]
    fn test_display_collapses_lines() {
        let banner = Banner::from_bytes(b"220 mail ESMTP\r\n250 ok\x01\r\n");
        assert_eq!(banner.display(), "220 mail ESMTP 250 ok.");
    }

    #[tokio::test]
    async fn test_read_banner_from_stream() {
        let (mut client, mut server) = tokio::io::duplex(64);
        tokio::io::AsyncWriteExt::write_all(&mut server, b"ready\n")
            .await
            .unwrap();

        let banner = read_banner(&mut client, Duration::from_millis(200)).await;
        assert_eq!(banner, Some(Banner::Text("ready".to_string())));
    }

    #[tokio::test]
    async fn test_read_banner_times_out() {
        let (mut client, _server) = tokio::io::duplex(64);
        let banner = read_banner(&mut client, Duration::from_millis(50)).await;
        assert!(banner.is_none());
    }

    #[tokio::test]
    async fn test_read_banner_eof() {
        let (mut client, server) = tokio::io::duplex(64);
        drop(server);
        let banner = read_banner(&mut client, Duration::from_millis(50)).await;
        assert!(banner.is_none());
    }
}
