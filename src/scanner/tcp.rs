//! TCP connect prober.
//!
//! Completes the full handshake using the operating system's socket API,
//! optionally reads a banner, then drops the connection. Does not require
//! elevated privileges.

use crate::banner::read_banner;
use crate::error::{ScanError, ScanResult};
use crate::scanner::traits::{PortResult, PortStatus, Prober};
use crate::services::identify;
use crate::types::{Port, Target};
use async_trait::async_trait;
use std::io;
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, trace};

/// Default bound on connection establishment.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(1);

/// Default bound on the banner read after connect.
pub const DEFAULT_BANNER_TIMEOUT: Duration = Duration::from_millis(500);

/// Per-probe timing and behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeOptions {
    /// How long to wait for the handshake.
    pub connect_timeout: Duration,
    /// How long to wait for the first bytes after connect.
    pub banner_timeout: Duration,
    /// Whether to read a banner from open ports.
    pub grab_banners: bool,
}

impl Default for ProbeOptions {
    fn default() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            banner_timeout: DEFAULT_BANNER_TIMEOUT,
            grab_banners: true,
        }
    }
}

impl ProbeOptions {
    /// Set the connect timeout.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the banner read timeout.
    pub fn with_banner_timeout(mut self, timeout: Duration) -> Self {
        self.banner_timeout = timeout;
        self
    }

    /// Disable banner grabbing.
    pub fn without_banners(mut self) -> Self {
        self.grab_banners = false;
        self
    }
}

/// How a connect attempt ended, before it becomes a [`PortStatus`].
#[derive(Debug)]
enum ConnectOutcome {
    Connected(TcpStream),
    Refused,
    TimedOut,
    Unreachable(io::Error),
    Failed(io::Error),
}

async fn attempt_connect(addr: SocketAddr, connect_timeout: Duration) -> ConnectOutcome {
    match timeout(connect_timeout, TcpStream::connect(addr)).await {
        Ok(Ok(stream)) => ConnectOutcome::Connected(stream),
        Ok(Err(e)) if e.kind() == io::ErrorKind::ConnectionRefused => ConnectOutcome::Refused,
        Ok(Err(e)) if e.kind() == io::ErrorKind::TimedOut => ConnectOutcome::TimedOut,
        Ok(Err(e)) if is_unreachable(&e) => ConnectOutcome::Unreachable(e),
        Ok(Err(e)) => ConnectOutcome::Failed(e),
        Err(_) => ConnectOutcome::TimedOut,
    }
}

/// Host or network unreachable, as reported by the local stack.
#[cfg(unix)]
pub(crate) fn is_unreachable(e: &io::Error) -> bool {
    matches!(
        e.raw_os_error(),
        Some(code) if code == libc::EHOSTUNREACH || code == libc::ENETUNREACH
    )
}

#[cfg(not(unix))]
pub(crate) fn is_unreachable(e: &io::Error) -> bool {
    // WSAENETUNREACH, WSAEHOSTUNREACH
    matches!(e.raw_os_error(), Some(10051) | Some(10065))
}

/// Probe one TCP port on `target`.
///
/// Port 0 is rejected with [`ScanError::InvalidPort`] before any network I/O.
/// Every network outcome is returned as a [`PortResult`]: refused is
/// `Closed`, no answer in time is `Filtered`, and an accepted connection is
/// `Open` whether or not the banner decodes. The stream is dropped before
/// returning on every path.
pub async fn probe(target: &Target, port: u16, options: &ProbeOptions) -> ScanResult<PortResult> {
    let port = Port::new(port).ok_or(ScanError::InvalidPort(port))?;
    Ok(probe_port(target, port, options).await)
}

async fn probe_port(target: &Target, port: Port, options: &ProbeOptions) -> PortResult {
    let port_num = port.as_u16();
    let addr = SocketAddr::new(target.ip, port_num);
    let start = Instant::now();

    match attempt_connect(addr, options.connect_timeout).await {
        ConnectOutcome::Connected(mut stream) => {
            let response_time = start.elapsed().as_millis() as u64;
            let banner = if options.grab_banners {
                read_banner(&mut stream, options.banner_timeout).await
            } else {
                None
            };
            drop(stream);

            debug!(%addr, response_time, has_banner = banner.is_some(), "port open");
            let service = identify(port_num, banner.as_ref());
            PortResult::new(port, PortStatus::Open, service)
                .with_banner(banner)
                .with_response_time(response_time)
        }
        ConnectOutcome::Refused => {
            trace!(%addr, "connection refused");
            PortResult::new(port, PortStatus::Closed, identify(port_num, None))
        }
        ConnectOutcome::TimedOut => {
            trace!(%addr, "connect timed out");
            PortResult::new(port, PortStatus::Filtered, identify(port_num, None))
        }
        ConnectOutcome::Unreachable(e) => {
            trace!(%addr, error = %e, "destination unreachable");
            PortResult::new(port, PortStatus::Filtered, identify(port_num, None))
        }
        ConnectOutcome::Failed(e) => {
            debug!(%addr, error = %e, "connect failed");
            PortResult::new(port, PortStatus::Filtered, identify(port_num, None))
                .with_error(e.to_string())
        }
    }
}

/// TCP connect prober used by the scan coordinator.
#[derive(Debug, Clone, Default)]
pub struct TcpProber {
    options: ProbeOptions,
}

impl TcpProber {
    /// Create a new TCP prober.
    pub fn new(options: ProbeOptions) -> Self {
        Self { options }
    }

    /// The options every probe uses.
    pub fn options(&self) -> &ProbeOptions {
        &self.options
    }
}

#[async_trait]
impl Prober for TcpProber {
    async fn probe(&self, target: &Target, port: Port) -> PortResult {
        probe_port(target, port, &self.options).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::banner::Banner;
    use std::net::{IpAddr, Ipv4Addr};
    use tokio::io::AsyncWriteExt;
    use tokio::net::TcpListener;

    fn localhost() -> Target {
        Target::from(IpAddr::V4(Ipv4Addr::LOCALHOST))
    }

    /// Listener that writes `payload` to every client and keeps the socket
    /// open briefly.
    async fn serve(payload: &'static [u8]) -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                let _ = socket.write_all(payload).await;
                tokio::time::sleep(Duration::from_millis(200)).await;
            }
        });
        port
    }

    /// A loopback port with nothing listening on it.
    async fn closed_port() -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap().port()
    }

    #[cfg(unix)]
    #[test]
    fn test_unreachable_errors() {
        let host = io::Error::from_raw_os_error(libc::EHOSTUNREACH);
        let net = io::Error::from_raw_os_error(libc::ENETUNREACH);
        let refused = io::Error::from_raw_os_error(libc::ECONNREFUSED);
        assert!(is_unreachable(&host));
        assert!(is_unreachable(&net));
        assert!(!is_unreachable(&refused));
        assert!(!is_unreachable(&io::Error::new(io::ErrorKind::Other, "plain")));
    }

    #[tokio::test]
    async fn test_port_zero_is_rejected() {
        let result = probe(&localhost(), 0, &ProbeOptions::default()).await;
        assert!(matches!(result, Err(ScanError::InvalidPort(0))));
    }

    #[tokio::test]
    async fn test_refused_is_closed() {
        let port = closed_port().await;
        let result = probe(&localhost(), port, &ProbeOptions::default())
            .await
            .unwrap();
        assert_eq!(result.status, PortStatus::Closed);
        assert!(result.banner.is_none());
    }

    #[tokio::test]
    async fn test_open_with_text_banner() {
        let port = serve(b"ready\n").await;
        let result = probe(&localhost(), port, &ProbeOptions::default())
            .await
            .unwrap();
        assert_eq!(result.status, PortStatus::Open);
        assert_eq!(result.banner, Some(Banner::Text("ready".to_string())));
        assert!(result.response_time_ms.is_some());
    }

    #[tokio::test]
    async fn test_non_text_banner_stays_open() {
        let port = serve(&[0xff, 0xfe, 0xfd, 0x00]).await;
        let result = probe(&localhost(), port, &ProbeOptions::default())
            .await
            .unwrap();
        assert_eq!(result.status, PortStatus::Open);
        assert_eq!(result.banner, Some(Banner::Binary(vec![0xff, 0xfe, 0xfd, 0x00])));
    }

    #[tokio::test]
    async fn test_silent_service_is_open_without_banner() {
        let port = serve(b"").await;
        let options = ProbeOptions::default().with_banner_timeout(Duration::from_millis(50));
        let result = probe(&localhost(), port, &options).await.unwrap();
        assert_eq!(result.status, PortStatus::Open);
        assert!(result.banner.is_none());
    }

    #[tokio::test]
    async fn test_banner_grabbing_disabled() {
        let port = serve(b"SSH-2.0-test\r\n").await;
        let options = ProbeOptions::default().without_banners();
        let result = probe(&localhost(), port, &options).await.unwrap();
        assert_eq!(result.status, PortStatus::Open);
        assert!(result.banner.is_none());
    }

    #[tokio::test]
    async fn test_unresponsive_is_filtered() {
        // TEST-NET-1 is reserved and never answers.
        let target = Target::from(IpAddr::V4(Ipv4Addr::new(192, 0, 2, 1)));
        let options = ProbeOptions::default().with_connect_timeout(Duration::from_millis(100));
        let result = probe(&target, 80, &options).await.unwrap();
        assert_eq!(result.status, PortStatus::Filtered);
    }

    #[tokio::test]
    async fn test_prober_trait() {
        let port = closed_port().await;
        let prober = TcpProber::default();
        assert_eq!(prober.options().connect_timeout, DEFAULT_CONNECT_TIMEOUT);
        let result = prober.probe(&localhost(), Port::new(port).unwrap()).await;
        assert_eq!(result.status, PortStatus::Closed);
    }
}
