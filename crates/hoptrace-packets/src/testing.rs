//! Frame builders for tests.
//!
//! Produce packets in the shape raw ICMP sockets deliver them: IPv4 frames
//! start at the outer IP header, ICMPv6 frames at the ICMPv6 header.

use pnet_packet::icmp::{IcmpCode, IcmpType, MutableIcmpPacket};
use pnet_packet::icmpv6::{Icmpv6Code, Icmpv6Type, MutableIcmpv6Packet};
use pnet_packet::ip::IpNextHeaderProtocols;
use pnet_packet::ipv4::MutableIpv4Packet;
use pnet_packet::ipv6::MutableIpv6Packet;
use pnet_packet::udp::MutableUdpPacket;
use std::net::{Ipv4Addr, Ipv6Addr};

pub const ICMP_TIME_EXCEEDED: u8 = 11;
pub const ICMP_DEST_UNREACHABLE: u8 = 3;
pub const ICMP_ECHO_REPLY: u8 = 0;
pub const ICMPV6_TIME_EXCEEDED: u8 = 3;
pub const ICMPV6_DEST_UNREACHABLE: u8 = 1;

/// Addresses and ports of the probe quoted inside an error.
#[derive(Debug, Clone, Copy)]
pub struct QuotedProbe<A> {
    pub src: A,
    pub dst: A,
    pub src_port: u16,
    pub dst_port: u16,
}

/// Builds an IPv4 ICMP message from `router` quoting a UDP probe.
pub fn icmpv4_error(
    router: Ipv4Addr,
    icmp_type: u8,
    icmp_code: u8,
    probe: QuotedProbe<Ipv4Addr>,
) -> Vec<u8> {
    // outer IP (20) + ICMP (8) + inner IP (20) + UDP (8)
    let total = 56;
    let mut buf = vec![0u8; total];

    {
        let mut outer = MutableIpv4Packet::new(&mut buf[..]).expect("sized for IPv4 header");
        outer.set_version(4);
        outer.set_header_length(5);
        outer.set_total_length(total as u16);
        outer.set_ttl(64);
        outer.set_next_level_protocol(IpNextHeaderProtocols::Icmp);
        outer.set_source(router);
        outer.set_destination(probe.src);
    }
    {
        let mut inner = MutableIpv4Packet::new(&mut buf[28..48]).expect("sized for IPv4 header");
        inner.set_version(4);
        inner.set_header_length(5);
        inner.set_total_length(28);
        inner.set_ttl(1);
        inner.set_next_level_protocol(IpNextHeaderProtocols::Udp);
        inner.set_source(probe.src);
        inner.set_destination(probe.dst);
    }
    {
        let mut udp = MutableUdpPacket::new(&mut buf[48..]).expect("sized for UDP header");
        udp.set_source(probe.src_port);
        udp.set_destination(probe.dst_port);
        udp.set_length(8);
    }
    {
        let mut icmp = MutableIcmpPacket::new(&mut buf[20..]).expect("sized for ICMP header");
        icmp.set_icmp_type(IcmpType::new(icmp_type));
        icmp.set_icmp_code(IcmpCode::new(icmp_code));
        let checksum = pnet_packet::icmp::checksum(&icmp.to_immutable());
        icmp.set_checksum(checksum);
    }

    buf
}

/// Builds an IPv4 ICMP message with no quoted datagram (e.g. an echo reply).
pub fn icmpv4_bare(router: Ipv4Addr, to: Ipv4Addr, icmp_type: u8) -> Vec<u8> {
    let total = 28;
    let mut buf = vec![0u8; total];
    {
        let mut outer = MutableIpv4Packet::new(&mut buf[..]).expect("sized for IPv4 header");
        outer.set_version(4);
        outer.set_header_length(5);
        outer.set_total_length(total as u16);
        outer.set_ttl(64);
        outer.set_next_level_protocol(IpNextHeaderProtocols::Icmp);
        outer.set_source(router);
        outer.set_destination(to);
    }
    {
        let mut icmp = MutableIcmpPacket::new(&mut buf[20..]).expect("sized for ICMP header");
        icmp.set_icmp_type(IcmpType::new(icmp_type));
    }
    buf
}

/// Builds an ICMPv6 message (without the IPv6 header) quoting a UDP probe.
pub fn icmpv6_error(icmp_type: u8, icmp_code: u8, probe: QuotedProbe<Ipv6Addr>) -> Vec<u8> {
    // ICMPv6 (8) + inner IPv6 (40) + UDP (8)
    let mut buf = vec![0u8; 56];

    {
        let mut inner = MutableIpv6Packet::new(&mut buf[8..48]).expect("sized for IPv6 header");
        inner.set_version(6);
        inner.set_payload_length(8);
        inner.set_next_header(IpNextHeaderProtocols::Udp);
        inner.set_hop_limit(1);
        inner.set_source(probe.src);
        inner.set_destination(probe.dst);
    }
    {
        let mut udp = MutableUdpPacket::new(&mut buf[48..]).expect("sized for UDP header");
        udp.set_source(probe.src_port);
        udp.set_destination(probe.dst_port);
        udp.set_length(8);
    }
    {
        let mut icmp = MutableIcmpv6Packet::new(&mut buf[..]).expect("sized for ICMPv6 header");
        icmp.set_icmpv6_type(Icmpv6Type::new(icmp_type));
        icmp.set_icmpv6_code(Icmpv6Code::new(icmp_code));
    }

    buf
}
