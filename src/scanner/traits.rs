//! Prober trait abstraction.
//!
//! Defines the per-port result types and the seam between the scan
//! coordinator and whatever actually touches the network.

use crate::banner::Banner;
use crate::types::{Port, Target};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Status of a scanned port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PortStatus {
    /// Port is open (connection accepted).
    Open,
    /// Port is closed (connection actively refused).
    Closed,
    /// No answer within the timeout, or the probe faulted.
    Filtered,
}

impl fmt::Display for PortStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Open => write!(f, "open"),
            Self::Closed => write!(f, "closed"),
            Self::Filtered => write!(f, "filtered"),
        }
    }
}

/// Result of probing a single port.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortResult {
    /// The port number that was probed.
    pub port: Port,
    /// Status determined by the probe.
    pub status: PortStatus,
    /// Detected or inferred service name.
    pub service: String,
    /// First bytes the service sent, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub banner: Option<Banner>,
    /// Connect time in milliseconds (open ports only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_time_ms: Option<u64>,
    /// Why the probe could not classify the port normally.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PortResult {
    /// Create a new port result.
    pub fn new(port: Port, status: PortStatus, service: impl Into<String>) -> Self {
        Self {
            port,
            status,
            service: service.into(),
            banner: None,
            response_time_ms: None,
            error: None,
        }
    }

    /// A `Filtered` result for a probe that failed unexpectedly.
    pub fn faulted(port: Port, reason: impl Into<String>) -> Self {
        Self::new(port, PortStatus::Filtered, "unknown").with_error(reason)
    }

    /// Set the banner.
    pub fn with_banner(mut self, banner: Option<Banner>) -> Self {
        self.banner = banner;
        self
    }

    /// Set the response time.
    pub fn with_response_time(mut self, time_ms: u64) -> Self {
        self.response_time_ms = Some(time_ms);
        self
    }

    /// Attach a fault description.
    pub fn with_error(mut self, reason: impl Into<String>) -> Self {
        self.error = Some(reason.into());
        self
    }

    /// Check if the port is open.
    pub fn is_open(&self) -> bool {
        self.status == PortStatus::Open
    }
}

/// Something that can classify one port of a resolved target.
///
/// Implementations must always return a result; network outcomes are
/// expressed through [`PortStatus`], not errors.
#[async_trait]
pub trait Prober: Send + Sync {
    /// Probe a single port.
    async fn probe(&self, target: &Target, port: Port) -> PortResult;
}
