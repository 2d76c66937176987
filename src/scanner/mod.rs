//! Scanner module - coordinates concurrent port probing.
//!
//! [`ScanCoordinator`] fans probes for a [`PortSpec`] out over the tokio
//! runtime with a fixed ceiling on live probes, and hands results back as a
//! stream in completion order.

pub mod rate_limiter;
pub mod tcp;
pub mod traits;

use crate::error::{ScanError, ScanResult};
use crate::fingerprint::OsGuess;
use crate::types::{Port, PortSpec, Target};
use chrono::{DateTime, Utc};
use futures::future;
use futures::stream::{self, BoxStream, StreamExt};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinError;
use tracing::{debug, warn};

pub use rate_limiter::RateLimiter;
pub use tcp::{probe, ProbeOptions, TcpProber, DEFAULT_BANNER_TIMEOUT, DEFAULT_CONNECT_TIMEOUT};
pub use traits::{PortResult, PortStatus, Prober};

/// Default ceiling on concurrently running probes.
pub const DEFAULT_MAX_CONCURRENCY: usize = 50;

/// Scan-wide cancellation signal.
///
/// Clones share the same flag. Once set, the coordinator stops submitting
/// new probes; probes already running finish within their own timeouts.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    /// Create an unset flag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    /// Whether cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Runs one scan's worth of probes under a concurrency ceiling.
///
/// Built per scan; owns nothing global.
pub struct ScanCoordinator {
    prober: Arc<dyn Prober>,
    max_concurrency: usize,
    rate_limiter: Option<RateLimiter>,
    cancel: CancelFlag,
}

impl ScanCoordinator {
    /// Create a coordinator around any prober.
    ///
    /// A ceiling of 0 is rejected.
    pub fn new(prober: Arc<dyn Prober>, max_concurrency: usize) -> ScanResult<Self> {
        if max_concurrency == 0 {
            return Err(ScanError::InvalidConfig(
                "max concurrency must be at least 1".to_string(),
            ));
        }
        Ok(Self {
            prober,
            max_concurrency,
            rate_limiter: None,
            cancel: CancelFlag::new(),
        })
    }

    /// Create a coordinator that probes with TCP connect.
    pub fn tcp(options: ProbeOptions, max_concurrency: usize) -> ScanResult<Self> {
        Self::new(Arc::new(TcpProber::new(options)), max_concurrency)
    }

    /// Limit probe submissions per second (0 = unlimited).
    pub fn with_rate_limit(mut self, rate: u32) -> Self {
        self.rate_limiter = RateLimiter::new(rate);
        self
    }

    /// Use an externally owned cancellation flag.
    pub fn with_cancel_flag(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    /// A handle that cancels this coordinator's scans.
    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    /// The configured concurrency ceiling.
    pub fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }

    /// Probe every port in `ports`, yielding results as probes complete.
    ///
    /// The stream is lazy: nothing is probed until it is polled. Each port is
    /// a separate task, so a probe that panics only costs its own port, which
    /// comes back `Filtered` with the fault in [`PortResult::error`]. Unless
    /// cancelled, the stream yields exactly one result per port.
    pub fn scan_ports(&self, target: Target, ports: PortSpec) -> BoxStream<'static, PortResult> {
        let target = Arc::new(target);
        let prober = Arc::clone(&self.prober);
        let limiter = self.rate_limiter.clone();
        let cancel = self.cancel.clone();

        debug!(
            target = %target,
            ports = ports.len(),
            max_concurrency = self.max_concurrency,
            "starting port scan"
        );

        stream::iter(ports)
            .then(move |port| {
                let limiter = limiter.clone();
                async move {
                    if let Some(limiter) = limiter {
                        limiter.wait().await;
                    }
                    port
                }
            })
            .take_while(move |_| future::ready(!cancel.is_cancelled()))
            .map(move |port| {
                let prober = Arc::clone(&prober);
                let target = Arc::clone(&target);
                async move {
                    let task = tokio::spawn(async move { prober.probe(&target, port).await });
                    match task.await {
                        Ok(result) => result,
                        Err(e) => {
                            let reason = fault_reason(e);
                            warn!(%port, %reason, "probe task failed");
                            PortResult::faulted(port, reason)
                        }
                    }
                }
            })
            .buffer_unordered(self.max_concurrency)
            .boxed()
    }

    /// Probe every port and wait for all of them to finish.
    pub async fn run(&self, target: Target, ports: PortSpec) -> Vec<PortResult> {
        self.scan_ports(target, ports).collect().await
    }
}

fn fault_reason(e: JoinError) -> String {
    if !e.is_panic() {
        return format!("probe task aborted: {}", e);
    }
    let payload = e.into_panic();
    let message = payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string());
    format!("probe panicked: {}", message)
}

/// Complete scan results for one target.
#[derive(Debug, Clone, Serialize)]
pub struct ScanReport {
    pub target: String,
    pub ip_address: String,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub ports_requested: usize,
    pub ports_scanned: usize,
    pub open_ports: usize,
    pub closed_ports: usize,
    pub filtered_ports: usize,
    /// True when the scan stopped before every port was probed.
    pub cancelled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub os: Option<OsGuess>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub os_warning: Option<String>,
    /// Results sorted by port number.
    pub results: Vec<PortResult>,
}

impl ScanReport {
    /// Summarize collected results. Results are re-sorted by port.
    pub fn new(
        target: &Target,
        ports_requested: usize,
        started_at: DateTime<Utc>,
        duration: Duration,
        mut results: Vec<PortResult>,
    ) -> Self {
        results.sort_by_key(|r| r.port);
        let count = |status: PortStatus| results.iter().filter(|r| r.status == status).count();

        Self {
            target: target.original.clone(),
            ip_address: target.ip.to_string(),
            started_at,
            duration_ms: duration.as_millis() as u64,
            ports_requested,
            ports_scanned: results.len(),
            open_ports: count(PortStatus::Open),
            closed_ports: count(PortStatus::Closed),
            filtered_ports: count(PortStatus::Filtered),
            cancelled: results.len() < ports_requested,
            os: None,
            os_warning: None,
            results,
        }
    }

    /// Attach the OS probe outcome.
    pub fn with_os(mut self, os: OsGuess) -> Self {
        self.os = Some(os);
        self
    }

    /// Attach a non-fatal OS probe failure.
    pub fn with_os_warning(mut self, warning: impl Into<String>) -> Self {
        self.os_warning = Some(warning.into());
        self
    }

    /// Results to display, hiding closed ports unless asked.
    pub fn visible_results(&self, show_closed: bool) -> impl Iterator<Item = &PortResult> {
        self.results
            .iter()
            .filter(move |r| show_closed || r.status != PortStatus::Closed)
    }

    /// Look up the result for one port.
    pub fn result_for(&self, port: Port) -> Option<&PortResult> {
        self.results
            .binary_search_by_key(&port, |r| r.port)
            .ok()
            .map(|i| &self.results[i])
    }
}
