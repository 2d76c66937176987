//! Port types with validation and parsing.
//!
//! The `Port` newtype ensures values are always valid port numbers (1-65535).
//! `PortSpec` is the deduplicated set of ports handed to the scan coordinator.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// A validated network port number (1-65535).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Port(u16);

impl Port {
    /// Minimum valid port number.
    pub const MIN: u16 = 1;
    /// Maximum valid port number.
    pub const MAX: u16 = 65535;

    /// Create a new Port from a u16, returning None if invalid.
    #[inline]
    pub const fn new(port: u16) -> Option<Self> {
        if port >= Self::MIN {
            Some(Self(port))
        } else {
            None
        }
    }

    /// Get the raw port number.
    #[inline]
    pub const fn as_u16(self) -> u16 {
        self.0
    }
}

impl fmt::Display for Port {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<u16> for Port {
    type Error = PortError;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        Self::new(value).ok_or(PortError::OutOfRange(value))
    }
}

impl From<Port> for u16 {
    fn from(port: Port) -> Self {
        port.0
    }
}

/// Error type for port parsing and validation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PortError {
    #[error("port {0} is out of valid range (1-65535)")]
    OutOfRange(u16),
    #[error("invalid port number: {0}")]
    InvalidFormat(String),
    #[error("invalid port range: start ({0}) > end ({1})")]
    InvalidRange(u16, u16),
    #[error("empty port specification")]
    Empty,
}

/// The set of ports to probe in one scan.
///
/// Duplicates collapse on insertion and iteration is in ascending order.
/// Parsing from text supports:
/// - Single port: "80"
/// - Comma-separated: "80,443,8080"
/// - Range: "1-1000"
/// - Mixed: "22,80,443,8000-9000"
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortSpec {
    ports: BTreeSet<Port>,
}

impl PortSpec {
    /// Create an empty port specification.
    pub const fn new() -> Self {
        Self {
            ports: BTreeSet::new(),
        }
    }

    /// Build a spec from already-expanded port numbers.
    ///
    /// Fails on the first number outside 1-65535.
    pub fn from_numbers<I>(numbers: I) -> Result<Self, PortError>
    where
        I: IntoIterator<Item = u16>,
    {
        let mut spec = Self::new();
        for n in numbers {
            spec.insert(Port::try_from(n)?);
        }
        Ok(spec)
    }

    /// Add a single port. Returns false if it was already present.
    pub fn insert(&mut self, port: Port) -> bool {
        self.ports.insert(port)
    }

    /// Iterate over the ports in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = Port> + '_ {
        self.ports.iter().copied()
    }

    /// Number of unique ports.
    pub fn len(&self) -> usize {
        self.ports.len()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.ports.is_empty()
    }

    /// Full port range (1-65535).
    pub fn full() -> Self {
        Self {
            ports: (Port::MIN..=Port::MAX).map(Port).collect(),
        }
    }
}

impl IntoIterator for PortSpec {
    type Item = Port;
    type IntoIter = std::collections::btree_set::IntoIter<Port>;

    fn into_iter(self) -> Self::IntoIter {
        self.ports.into_iter()
    }
}

impl FromIterator<Port> for PortSpec {
    fn from_iter<T: IntoIterator<Item = Port>>(iter: T) -> Self {
        Self {
            ports: iter.into_iter().collect(),
        }
    }
}

fn parse_number(s: &str) -> Result<Port, PortError> {
    let s = s.trim();
    let n: u16 = s
        .parse()
        .map_err(|_| PortError::InvalidFormat(s.to_string()))?;
    Port::try_from(n)
}

impl FromStr for PortSpec {
    type Err = PortError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(PortError::Empty);
        }

        let mut spec = Self::new();

        for part in s.split(',') {
            let part = part.trim();
            match part.split_once('-') {
                Some((start, end)) => {
                    let start = parse_number(start)?;
                    let end = parse_number(end)?;
                    if start > end {
                        return Err(PortError::InvalidRange(start.0, end.0));
                    }
                    spec.ports.extend((start.0..=end.0).map(Port));
                }
                None => {
                    spec.insert(parse_number(part)?);
                }
            }
        }

        Ok(spec)
    }
}

impl fmt::Display for PortSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Collapse consecutive runs back into "a-b" form.
        let mut parts = Vec::new();
        let mut iter = self.ports.iter().map(|p| p.0).peekable();
        while let Some(start) = iter.next() {
            let mut end = start;
            while iter.peek() == Some(&(end.wrapping_add(1))) && end != Port::MAX {
                end += 1;
                iter.next();
            }
            if start == end {
                parts.push(start.to_string());
            } else {
                parts.push(format!("{}-{}", start, end));
            }
        }
        write!(f, "{}", parts.join(","))
    }
}
