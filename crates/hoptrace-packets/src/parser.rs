//! ICMP error notification parsing using pnet.

use hoptrace_core::TracerouteError;
use pnet_packet::icmp::{IcmpPacket, IcmpTypes};
use pnet_packet::icmpv6::{Icmpv6Packet, Icmpv6Types};
use pnet_packet::ip::{IpNextHeaderProtocol, IpNextHeaderProtocols};
use pnet_packet::ipv4::Ipv4Packet;
use pnet_packet::ipv6::Ipv6Packet;
use std::net::IpAddr;

const IPV4_HEADER_LEN: usize = 20;
const IPV6_HEADER_LEN: usize = 40;
/// Type, code, checksum and the 4-byte rest-of-header.
const ICMP_HEADER_LEN: usize = 8;
const UDP_HEADER_LEN: usize = 8;

/// Kind of ICMP message received.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    /// Hop-limit reached zero at a router.
    TimeExceeded,
    /// The destination (or a router) rejected the datagram.
    DestinationUnreachable,
    /// Any other ICMP message.
    Other,
}

/// UDP header info parsed from an ICMP payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UdpInfo {
    pub src_port: u16,
    pub dst_port: u16,
    pub length: u16,
    pub checksum: u16,
}

/// Header fields of the original datagram quoted in an ICMP error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EmbeddedProbe {
    pub src_addr: IpAddr,
    pub dst_addr: IpAddr,
    pub protocol: IpNextHeaderProtocol,
    /// First 8 bytes of the transport header, when it was UDP.
    pub udp: Option<UdpInfo>,
}

/// A parsed inbound ICMP message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    /// Node that sent the message.
    pub responder: IpAddr,
    pub icmp_type: u8,
    pub icmp_code: u8,
    pub kind: NotificationKind,
    /// Quoted original datagram, if the message carried a parseable one.
    pub embedded: Option<EmbeddedProbe>,
}

impl Notification {
    /// Returns true for Time Exceeded and Destination Unreachable messages.
    pub fn is_error(&self) -> bool {
        self.kind != NotificationKind::Other
    }

    /// Returns true if this is an error about a UDP datagram sent to
    /// `destination:port`.
    pub fn matches_probe(&self, destination: IpAddr, port: u16) -> bool {
        if !self.is_error() {
            return false;
        }
        match &self.embedded {
            Some(EmbeddedProbe {
                dst_addr,
                udp: Some(udp),
                ..
            }) => *dst_addr == destination && udp.dst_port == port,
            _ => false,
        }
    }
}

/// Parse the first 8 bytes of a UDP header from an ICMP payload.
pub fn parse_udp_first_bytes(buf: &[u8]) -> Result<UdpInfo, TracerouteError> {
    if buf.len() < UDP_HEADER_LEN {
        return Err(TracerouteError::PacketTooShort {
            expected: UDP_HEADER_LEN,
            actual: buf.len(),
        });
    }

    Ok(UdpInfo {
        src_port: u16::from_be_bytes([buf[0], buf[1]]),
        dst_port: u16::from_be_bytes([buf[2], buf[3]]),
        length: u16::from_be_bytes([buf[4], buf[5]]),
        checksum: u16::from_be_bytes([buf[6], buf[7]]),
    })
}

/// Parses a packet read from a raw ICMP socket.
///
/// IPv4 raw sockets deliver the IP header, so `buf` starts there and the
/// responder is taken from it. ICMPv6 sockets strip the IP header, so the
/// responder is the socket-level sender `from`.
pub fn parse_notification(
    buf: &[u8],
    from: IpAddr,
    ipv6: bool,
) -> Result<Notification, TracerouteError> {
    if ipv6 {
        parse_icmpv6(buf, from)
    } else {
        parse_ipv4(buf)
    }
}

fn parse_ipv4(buf: &[u8]) -> Result<Notification, TracerouteError> {
    let ip = Ipv4Packet::new(buf).ok_or(TracerouteError::PacketTooShort {
        expected: IPV4_HEADER_LEN,
        actual: buf.len(),
    })?;

    if ip.get_version() != 4 {
        return Err(TracerouteError::PacketParseFailed {
            layer: "IP",
            reason: format!("unexpected version {}", ip.get_version()),
        });
    }

    let header_len = ipv4_header_len(&ip, buf.len())?;
    if ip.get_next_level_protocol() != IpNextHeaderProtocols::Icmp {
        return Err(TracerouteError::PacketMismatch);
    }

    let icmp_buf = &buf[header_len..];
    let icmp = IcmpPacket::new(icmp_buf).ok_or(TracerouteError::PacketTooShort {
        expected: header_len + 4,
        actual: buf.len(),
    })?;

    let icmp_type = icmp.get_icmp_type();
    let kind = if icmp_type == IcmpTypes::TimeExceeded {
        NotificationKind::TimeExceeded
    } else if icmp_type == IcmpTypes::DestinationUnreachable {
        NotificationKind::DestinationUnreachable
    } else {
        NotificationKind::Other
    };

    let embedded = match kind {
        NotificationKind::Other => None,
        _ => icmp_buf.get(ICMP_HEADER_LEN..).and_then(parse_embedded_ipv4),
    };

    Ok(Notification {
        responder: IpAddr::V4(ip.get_source()),
        icmp_type: icmp_type.0,
        icmp_code: icmp.get_icmp_code().0,
        kind,
        embedded,
    })
}

fn parse_icmpv6(buf: &[u8], from: IpAddr) -> Result<Notification, TracerouteError> {
    let icmp = Icmpv6Packet::new(buf).ok_or(TracerouteError::PacketTooShort {
        expected: 4,
        actual: buf.len(),
    })?;

    let icmp_type = icmp.get_icmpv6_type();
    let kind = if icmp_type == Icmpv6Types::TimeExceeded {
        NotificationKind::TimeExceeded
    } else if icmp_type == Icmpv6Types::DestinationUnreachable {
        NotificationKind::DestinationUnreachable
    } else {
        NotificationKind::Other
    };

    let embedded = match kind {
        NotificationKind::Other => None,
        _ => buf.get(ICMP_HEADER_LEN..).and_then(parse_embedded_ipv6),
    };

    Ok(Notification {
        responder: from,
        icmp_type: icmp_type.0,
        icmp_code: icmp.get_icmpv6_code().0,
        kind,
        embedded,
    })
}

fn ipv4_header_len(ip: &Ipv4Packet<'_>, available: usize) -> Result<usize, TracerouteError> {
    let header_len = ip.get_header_length() as usize * 4;
    if header_len < IPV4_HEADER_LEN || header_len > available {
        return Err(TracerouteError::PacketParseFailed {
            layer: "IP",
            reason: format!("bad header length {} for {} bytes", header_len, available),
        });
    }
    Ok(header_len)
}

// Routers only have to quote the IP header plus 8 bytes, so anything past
// the transport ports is not expected here.
fn parse_embedded_ipv4(buf: &[u8]) -> Option<EmbeddedProbe> {
    let ip = Ipv4Packet::new(buf)?;
    let header_len = ipv4_header_len(&ip, buf.len()).ok()?;
    let protocol = ip.get_next_level_protocol();
    let udp = if protocol == IpNextHeaderProtocols::Udp {
        parse_udp_first_bytes(&buf[header_len..]).ok()
    } else {
        None
    };

    Some(EmbeddedProbe {
        src_addr: IpAddr::V4(ip.get_source()),
        dst_addr: IpAddr::V4(ip.get_destination()),
        protocol,
        udp,
    })
}

fn parse_embedded_ipv6(buf: &[u8]) -> Option<EmbeddedProbe> {
    let ip = Ipv6Packet::new(buf)?;
    let protocol = ip.get_next_header();
    let udp = if protocol == IpNextHeaderProtocols::Udp {
        parse_udp_first_bytes(&buf[IPV6_HEADER_LEN..]).ok()
    } else {
        None
    };

    Some(EmbeddedProbe {
        src_addr: IpAddr::V6(ip.get_source()),
        dst_addr: IpAddr::V6(ip.get_destination()),
        protocol,
        udp,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_udp_first_bytes() {
        let buf = [0x00, 0x50, 0x82, 0x9A, 0x00, 0x10, 0x12, 0x34];
        let info = parse_udp_first_bytes(&buf).unwrap();
        assert_eq!(info.src_port, 80);
        assert_eq!(info.dst_port, 33434);
        assert_eq!(info.length, 16);
        assert_eq!(info.checksum, 0x1234);
    }

    #[test]
    fn test_parse_udp_first_bytes_short() {
        let err = parse_udp_first_bytes(&[0x00, 0x50, 0x82]).unwrap_err();
        assert!(matches!(
            err,
            TracerouteError::PacketTooShort {
                expected: 8,
                actual: 3
            }
        ));
    }

    #[test]
    fn test_short_ipv4_packet_rejected() {
        let from = "10.0.0.1".parse().unwrap();
        let err = parse_notification(&[0x45, 0x00, 0x00], from, false).unwrap_err();
        assert!(err.is_retryable());
    }

    #[test]
    fn test_bad_ipv4_header_length_rejected() {
        // IHL of 15 words claims 60 bytes of header in a 20-byte buffer.
        let mut buf = [0u8; 20];
        buf[0] = 0x4F;
        buf[9] = 1;
        let from = "10.0.0.1".parse().unwrap();
        let err = parse_notification(&buf, from, false).unwrap_err();
        assert!(matches!(err, TracerouteError::PacketParseFailed { layer: "IP", .. }));
    }

    #[test]
    fn test_non_icmp_ipv4_is_mismatch() {
        let mut buf = [0u8; 28];
        buf[0] = 0x45;
        buf[9] = 17; // UDP
        let from = "10.0.0.1".parse().unwrap();
        let err = parse_notification(&buf, from, false).unwrap_err();
        assert!(matches!(err, TracerouteError::PacketMismatch));
    }
}
