//! Best-effort OS guessing from ICMP echo TTL.
//!
//! Sends one ICMPv4 echo request over a raw socket and maps the TTL of the
//! reply onto a coarse OS family. The initial TTL a stack picks is a weak
//! signal: many unrelated systems start at 64, so the label is a hint only.
//!
//! Raw sockets need root or `CAP_NET_RAW`; without them the probe fails with
//! [`FingerprintError::PermissionDenied`] and the caller carries on without an
//! OS guess.

use crate::error::FingerprintError;
use crate::scanner::tcp::is_unreachable;
use crate::types::Target;
use pnet::packet::icmp::echo_reply::EchoReplyPacket;
use pnet::packet::icmp::echo_request::MutableEchoRequestPacket;
use pnet::packet::icmp::{self, IcmpPacket, IcmpTypes};
use pnet::packet::ip::IpNextHeaderProtocols;
use pnet::packet::ipv4::Ipv4Packet;
use pnet::packet::Packet;
use serde::{Deserialize, Serialize};
use socket2::{Domain, Protocol, Socket, Type};
use std::fmt;
use std::io::{self, Read};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::{Duration, Instant};
use tracing::{debug, trace};

/// Default time to wait for the echo reply.
pub const DEFAULT_ICMP_TIMEOUT: Duration = Duration::from_secs(1);

const ECHO_PAYLOAD: &[u8] = b"portscout ttl probe";
const ECHO_SEQUENCE: u16 = 1;

/// Shortest read timeout handed to the socket.
const MIN_READ_TIMEOUT: Duration = Duration::from_millis(1);

/// Extra time the async caller allows the blocking probe before giving up.
const BLOCKING_SLACK: Duration = Duration::from_millis(250);

/// Coarse OS family inferred from a TTL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OsLabel {
    #[serde(rename = "Linux/Unix")]
    LinuxUnix,
    #[serde(rename = "Windows 2000")]
    Windows2000,
    #[serde(rename = "Windows 9x/NT")]
    Windows9xNt,
    #[serde(rename = "Windows")]
    Windows,
    #[serde(rename = "Solaris")]
    Solaris,
    #[serde(rename = "Unknown OS")]
    Unknown,
}

impl OsLabel {
    /// Map an observed TTL onto a label.
    pub const fn from_ttl(ttl: u8) -> Self {
        match ttl {
            0..=64 => Self::LinuxUnix,
            108 => Self::Windows2000,
            127 => Self::Windows9xNt,
            128 => Self::Windows,
            252 => Self::Solaris,
            _ => Self::Unknown,
        }
    }

    /// Human-readable label.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::LinuxUnix => "Linux/Unix",
            Self::Windows2000 => "Windows 2000",
            Self::Windows9xNt => "Windows 9x/NT",
            Self::Windows => "Windows",
            Self::Solaris => "Solaris",
            Self::Unknown => "Unknown OS",
        }
    }
}

impl fmt::Display for OsLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of the OS probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum OsGuess {
    /// A reply arrived with this TTL.
    Detected { ttl: u8, label: OsLabel },
    /// No reply within the timeout.
    NoResponse,
}

impl OsGuess {
    /// Build a guess from an observed TTL.
    pub const fn from_ttl(ttl: u8) -> Self {
        Self::Detected {
            ttl,
            label: OsLabel::from_ttl(ttl),
        }
    }

    /// The label, if a reply was seen.
    pub fn label(&self) -> Option<OsLabel> {
        match self {
            Self::Detected { label, .. } => Some(*label),
            Self::NoResponse => None,
        }
    }
}

impl fmt::Display for OsGuess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Detected { ttl, label } => write!(f, "{} (ttl {})", label, ttl),
            Self::NoResponse => write!(f, "no response"),
        }
    }
}

/// Send one ICMP echo request to `target` and guess its OS from the reply TTL.
///
/// No reply within `timeout` is `Ok(OsGuess::NoResponse)`, not an error.
/// IPv6 targets are unsupported.
pub async fn fingerprint(target: &Target, timeout: Duration) -> Result<OsGuess, FingerprintError> {
    let ip = match target.ip {
        IpAddr::V4(ip) => ip,
        IpAddr::V6(_) => {
            return Err(FingerprintError::Unsupported(
                "TTL probing is only implemented for IPv4 targets".to_string(),
            ))
        }
    };

    let identifier: u16 = rand::random();
    let probe = tokio::task::spawn_blocking(move || probe_ttl(ip, identifier, timeout));
    let guess = match tokio::time::timeout(timeout + BLOCKING_SLACK, probe).await {
        Ok(joined) => {
            joined.map_err(|e| FingerprintError::Io(io::Error::new(io::ErrorKind::Other, e)))??
        }
        Err(_) => {
            debug!(target = %ip, "ICMP probe overran its deadline");
            OsGuess::NoResponse
        }
    };

    debug!(target = %ip, %guess, "OS fingerprint complete");
    Ok(guess)
}

/// Something raw IPv4 datagrams can be read from.
trait DatagramSource {
    /// Read one datagram, waiting at most `timeout`.
    fn recv_datagram(&mut self, buffer: &mut [u8], timeout: Duration) -> io::Result<usize>;
}

impl DatagramSource for Socket {
    fn recv_datagram(&mut self, buffer: &mut [u8], timeout: Duration) -> io::Result<usize> {
        self.set_read_timeout(Some(timeout))?;
        Read::read(self, buffer)
    }
}

fn probe_ttl(target: Ipv4Addr, identifier: u16, timeout: Duration) -> Result<OsGuess, FingerprintError> {
    let mut socket = Socket::new(Domain::IPV4, Type::RAW, Some(Protocol::ICMPV4)).map_err(privilege_error)?;

    let request = build_echo_request(identifier, ECHO_SEQUENCE)?;
    let addr = SocketAddr::new(IpAddr::V4(target), 0);
    match socket.send_to(&request, &addr.into()) {
        Ok(_) => {}
        Err(e) if is_unreachable(&e) => {
            trace!(%target, error = %e, "echo request undeliverable");
            return Ok(OsGuess::NoResponse);
        }
        Err(e) => return Err(privilege_error(e)),
    }

    await_reply(&mut socket, target, identifier, timeout)
}

/// Read datagrams until our echo reply shows up or `timeout` runs out.
///
/// A zero read timeout means "block forever" to the kernel, so the wait ends
/// as soon as less than [`MIN_READ_TIMEOUT`] is left.
fn await_reply<S: DatagramSource>(
    source: &mut S,
    target: Ipv4Addr,
    identifier: u16,
    timeout: Duration,
) -> Result<OsGuess, FingerprintError> {
    let deadline = Instant::now() + timeout;
    let mut buffer = [0u8; 1500];
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining < MIN_READ_TIMEOUT {
            return Ok(OsGuess::NoResponse);
        }

        match source.recv_datagram(&mut buffer, remaining) {
            Ok(n) => {
                if let Some(ttl) = parse_echo_reply(&buffer[..n], target, identifier, ECHO_SEQUENCE) {
                    return Ok(OsGuess::from_ttl(ttl));
                }
                trace!(%target, len = n, "ignoring unrelated datagram");
            }
            Err(e)
                if matches!(
                    e.kind(),
                    io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut | io::ErrorKind::Interrupted
                ) => {}
            Err(e) => return Err(e.into()),
        }
    }
}

fn privilege_error(e: io::Error) -> FingerprintError {
    if e.kind() == io::ErrorKind::PermissionDenied {
        FingerprintError::PermissionDenied(e.to_string())
    } else {
        FingerprintError::Io(e)
    }
}

/// Build an ICMP echo request with a valid checksum.
fn build_echo_request(identifier: u16, sequence: u16) -> Result<Vec<u8>, FingerprintError> {
    let mut buffer = vec![0u8; MutableEchoRequestPacket::minimum_packet_size() + ECHO_PAYLOAD.len()];
    let mut packet = MutableEchoRequestPacket::new(&mut buffer)
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "echo request buffer too small"))?;

    packet.set_icmp_type(IcmpTypes::EchoRequest);
    packet.set_identifier(identifier);
    packet.set_sequence_number(sequence);
    packet.set_payload(ECHO_PAYLOAD);

    let checksum = IcmpPacket::new(packet.packet())
        .map(|p| icmp::checksum(&p))
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "malformed echo request"))?;
    packet.set_checksum(checksum);

    Ok(buffer)
}

/// Extract the TTL from a raw IPv4 datagram if it is our echo reply.
fn parse_echo_reply(data: &[u8], from: Ipv4Addr, identifier: u16, sequence: u16) -> Option<u8> {
    let ip = Ipv4Packet::new(data)?;
    if ip.get_source() != from || ip.get_next_level_protocol() != IpNextHeaderProtocols::Icmp {
        return None;
    }

    let header_len = usize::from(ip.get_header_length()) * 4;
    let reply = EchoReplyPacket::new(data.get(header_len..)?)?;
    if reply.get_icmp_type() != IcmpTypes::EchoReply
        || reply.get_identifier() != identifier
        || reply.get_sequence_number() != sequence
    {
        return None;
    }

    Some(ip.get_ttl())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pnet::packet::icmp::echo_reply::MutableEchoReplyPacket;
    use pnet::packet::icmp::IcmpType;
    use pnet::packet::ipv4::MutableIpv4Packet;
    use std::collections::VecDeque;

    fn datagram(source: Ipv4Addr, ttl: u8, icmp_type: IcmpType, identifier: u16) -> Vec<u8> {
        let icmp_len = MutableEchoReplyPacket::minimum_packet_size();
        let mut buffer = vec![0u8; 20 + icmp_len];
        {
            let mut ip = MutableIpv4Packet::new(&mut buffer).unwrap();
            ip.set_version(4);
            ip.set_header_length(5);
            ip.set_total_length((20 + icmp_len) as u16);
            ip.set_ttl(ttl);
            ip.set_next_level_protocol(IpNextHeaderProtocols::Icmp);
            ip.set_source(source);
            ip.set_destination(Ipv4Addr::new(10, 0, 0, 1));
        }
        {
            let mut reply = MutableEchoReplyPacket::new(&mut buffer[20..]).unwrap();
            reply.set_icmp_type(icmp_type);
            reply.set_identifier(identifier);
            reply.set_sequence_number(ECHO_SEQUENCE);
        }
        buffer
    }

    #[test]
    fn test_ttl_table() {
        assert_eq!(OsLabel::from_ttl(64), OsLabel::LinuxUnix);
        assert_eq!(OsLabel::from_ttl(1), OsLabel::LinuxUnix);
        assert_eq!(OsLabel::from_ttl(108), OsLabel::Windows2000);
        assert_eq!(OsLabel::from_ttl(127), OsLabel::Windows9xNt);
        assert_eq!(OsLabel::from_ttl(128), OsLabel::Windows);
        assert_eq!(OsLabel::from_ttl(252), OsLabel::Solaris);
        assert_eq!(OsLabel::from_ttl(200), OsLabel::Unknown);
        assert_eq!(OsLabel::from_ttl(65), OsLabel::Unknown);
    }

    #[test]
    fn test_label_strings() {
        assert_eq!(OsGuess::from_ttl(64).label().unwrap().as_str(), "Linux/Unix");
        assert_eq!(OsGuess::from_ttl(128).label().unwrap().as_str(), "Windows");
        assert_eq!(OsGuess::from_ttl(252).label().unwrap().as_str(), "Solaris");
        assert_eq!(OsGuess::from_ttl(200).label().unwrap().as_str(), "Unknown OS");
        assert_eq!(OsGuess::NoResponse.label(), None);
        assert_eq!(OsGuess::from_ttl(128).to_string(), "Windows (ttl 128)");
    }

    #[test]
    fn test_guess_serialization() {
        let json = serde_json::to_value(OsGuess::from_ttl(64)).unwrap();
        assert_eq!(json["result"], "detected");
        assert_eq!(json["ttl"], 64);
        assert_eq!(json["label"], "Linux/Unix");

        let json = serde_json::to_value(OsGuess::NoResponse).unwrap();
        assert_eq!(json["result"], "no_response");
    }

    #[test]
    fn test_echo_request_checksum() {
        let request = build_echo_request(0xbeef, ECHO_SEQUENCE).unwrap();
        let packet = IcmpPacket::new(&request).unwrap();
        assert_eq!(packet.get_icmp_type(), IcmpTypes::EchoRequest);
        assert_eq!(packet.get_checksum(), icmp::checksum(&packet));
        assert_ne!(packet.get_checksum(), 0);
    }

    #[test]
    fn test_parse_matching_reply() {
        let source = Ipv4Addr::new(192, 0, 2, 7);
        let data = datagram(source, 117, IcmpTypes::EchoReply, 42);
        assert_eq!(parse_echo_reply(&data, source, 42, ECHO_SEQUENCE), Some(117));
    }

    #[test]
    fn test_parse_ignores_foreign_packets() {
        let source = Ipv4Addr::new(192, 0, 2, 7);

        let other_id = datagram(source, 64, IcmpTypes::EchoReply, 43);
        assert_eq!(parse_echo_reply(&other_id, source, 42, ECHO_SEQUENCE), None);

        let other_host = datagram(Ipv4Addr::new(192, 0, 2, 8), 64, IcmpTypes::EchoReply, 42);
        assert_eq!(parse_echo_reply(&other_host, source, 42, ECHO_SEQUENCE), None);

        // Our own request looped back on the same raw socket.
        let request = datagram(source, 64, IcmpTypes::EchoRequest, 42);
        assert_eq!(parse_echo_reply(&request, source, 42, ECHO_SEQUENCE), None);

        assert_eq!(parse_echo_reply(&[0x45, 0x00], source, 42, ECHO_SEQUENCE), None);
    }

    #[tokio::test]
    async fn test_ipv6_unsupported() {
        let target = Target::from("::1".parse::<IpAddr>().unwrap());
        let result = fingerprint(&target, Duration::from_millis(50)).await;
        assert!(matches!(result, Err(FingerprintError::Unsupported(_))));
    }

    /// Replays queued datagrams, then stays silent until the timeout passes.
    struct ScriptedSource {
        datagrams: VecDeque<Vec<u8>>,
        waits: Vec<Duration>,
    }

    impl ScriptedSource {
        fn new(datagrams: Vec<Vec<u8>>) -> Self {
            Self {
                datagrams: datagrams.into(),
                waits: Vec::new(),
            }
        }
    }

    impl DatagramSource for ScriptedSource {
        fn recv_datagram(&mut self, buffer: &mut [u8], timeout: Duration) -> io::Result<usize> {
            self.waits.push(timeout);
            match self.datagrams.pop_front() {
                Some(data) => {
                    buffer[..data.len()].copy_from_slice(&data);
                    Ok(data.len())
                }
                None => {
                    std::thread::sleep(timeout);
                    Err(io::Error::new(io::ErrorKind::WouldBlock, "timed out"))
                }
            }
        }
    }

    #[test]
    fn test_silent_host_yields_no_response() {
        let source_ip = Ipv4Addr::new(192, 0, 2, 1);
        let mut source = ScriptedSource::new(Vec::new());

        let started = Instant::now();
        let guess = await_reply(&mut source, source_ip, 42, Duration::from_millis(100)).unwrap();

        assert_eq!(guess, OsGuess::NoResponse);
        assert!(started.elapsed() < Duration::from_secs(1));
        assert!(source.waits.iter().all(|wait| *wait >= MIN_READ_TIMEOUT));
    }

    #[test]
    fn test_reply_after_foreign_packets_is_detected() {
        let source_ip = Ipv4Addr::new(192, 0, 2, 7);
        let mut source = ScriptedSource::new(vec![
            datagram(Ipv4Addr::new(192, 0, 2, 8), 64, IcmpTypes::EchoReply, 42),
            datagram(source_ip, 64, IcmpTypes::EchoReply, 43),
            datagram(source_ip, 128, IcmpTypes::EchoReply, 42),
        ]);

        let guess = await_reply(&mut source, source_ip, 42, Duration::from_secs(1)).unwrap();
        assert_eq!(guess, OsGuess::from_ttl(128));
        assert_eq!(source.waits.len(), 3);
    }

    #[test]
    fn test_wait_never_hands_out_a_sub_millisecond_timeout() {
        let source_ip = Ipv4Addr::new(192, 0, 2, 7);
        let mut source = ScriptedSource::new(Vec::new());

        let guess = await_reply(&mut source, source_ip, 42, Duration::from_micros(500)).unwrap();
        assert_eq!(guess, OsGuess::NoResponse);
        assert!(source.waits.is_empty());
    }

    #[test]
    fn test_hard_read_errors_propagate() {
        struct Broken;
        impl DatagramSource for Broken {
            fn recv_datagram(&mut self, _buffer: &mut [u8], _timeout: Duration) -> io::Result<usize> {
                Err(io::Error::new(io::ErrorKind::Other, "socket closed"))
            }
        }

        let result = await_reply(&mut Broken, Ipv4Addr::new(192, 0, 2, 7), 42, Duration::from_secs(1));
        assert!(matches!(result, Err(FingerprintError::Io(_))));
    }
}
