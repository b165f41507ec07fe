//! Notification parsing against constructed frames.

use hoptrace_packets::testing::{
    icmpv4_bare, icmpv4_error, icmpv6_error, QuotedProbe, ICMPV6_TIME_EXCEEDED,
    ICMP_DEST_UNREACHABLE, ICMP_ECHO_REPLY, ICMP_TIME_EXCEEDED,
};
use hoptrace_packets::{parse_notification, NotificationKind};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

const LOCAL: Ipv4Addr = Ipv4Addr::new(192, 168, 1, 10);
const ROUTER: Ipv4Addr = Ipv4Addr::new(10, 0, 0, 1);
const DEST: Ipv4Addr = Ipv4Addr::new(203, 0, 113, 5);

fn probe_v4(dst_port: u16) -> QuotedProbe<Ipv4Addr> {
    QuotedProbe {
        src: LOCAL,
        dst: DEST,
        src_port: 51000,
        dst_port,
    }
}

#[test]
fn test_time_exceeded_v4() {
    let frame = icmpv4_error(ROUTER, ICMP_TIME_EXCEEDED, 0, probe_v4(33434));
    // Socket-level sender is ignored for IPv4; the IP header is authoritative.
    let n = parse_notification(&frame, IpAddr::V4(Ipv4Addr::UNSPECIFIED), false).unwrap();

    assert_eq!(n.responder, IpAddr::V4(ROUTER));
    assert_eq!(n.kind, NotificationKind::TimeExceeded);
    assert_eq!(n.icmp_type, 11);
    assert_eq!(n.icmp_code, 0);
    assert!(n.is_error());

    let embedded = n.embedded.expect("quoted datagram");
    assert_eq!(embedded.src_addr, IpAddr::V4(LOCAL));
    assert_eq!(embedded.dst_addr, IpAddr::V4(DEST));
    let udp = embedded.udp.expect("quoted UDP header");
    assert_eq!(udp.src_port, 51000);
    assert_eq!(udp.dst_port, 33434);

    assert!(n.matches_probe(IpAddr::V4(DEST), 33434));
    assert!(!n.matches_probe(IpAddr::V4(DEST), 33435));
    assert!(!n.matches_probe(IpAddr::V4(ROUTER), 33434));
}

#[test]
fn test_port_unreachable_from_destination() {
    let frame = icmpv4_error(DEST, ICMP_DEST_UNREACHABLE, 3, probe_v4(33434));
    let n = parse_notification(&frame, IpAddr::V4(DEST), false).unwrap();

    assert_eq!(n.responder, IpAddr::V4(DEST));
    assert_eq!(n.kind, NotificationKind::DestinationUnreachable);
    assert_eq!(n.icmp_code, 3);
    assert!(n.matches_probe(IpAddr::V4(DEST), 33434));
}

#[test]
fn test_echo_reply_is_not_an_error() {
    let frame = icmpv4_bare(ROUTER, LOCAL, ICMP_ECHO_REPLY);
    let n = parse_notification(&frame, IpAddr::V4(ROUTER), false).unwrap();

    assert_eq!(n.kind, NotificationKind::Other);
    assert!(!n.is_error());
    assert!(n.embedded.is_none());
    assert!(!n.matches_probe(IpAddr::V4(DEST), 33434));
}

#[test]
fn test_truncated_quote_still_parses() {
    let mut frame = icmpv4_error(ROUTER, ICMP_TIME_EXCEEDED, 0, probe_v4(33434));
    // Keep the outer headers and a partial inner IP header only.
    frame.truncate(36);
    let n = parse_notification(&frame, IpAddr::V4(ROUTER), false).unwrap();

    assert_eq!(n.kind, NotificationKind::TimeExceeded);
    assert!(n.embedded.is_none());
    assert!(!n.matches_probe(IpAddr::V4(DEST), 33434));
}

#[test]
fn test_time_exceeded_v6() {
    let local: Ipv6Addr = "2001:db8::10".parse().unwrap();
    let dest: Ipv6Addr = "2001:db8:ffff::5".parse().unwrap();
    let router: IpAddr = "2001:db8:1::1".parse().unwrap();

    let frame = icmpv6_error(
        ICMPV6_TIME_EXCEEDED,
        0,
        QuotedProbe {
            src: local,
            dst: dest,
            src_port: 51000,
            dst_port: 33434,
        },
    );
    let n = parse_notification(&frame, router, true).unwrap();

    assert_eq!(n.responder, router);
    assert_eq!(n.kind, NotificationKind::TimeExceeded);
    assert_eq!(n.icmp_type, 3);
    assert!(n.matches_probe(IpAddr::V6(dest), 33434));
}

#[test]
fn test_empty_icmpv6_rejected() {
    let router: IpAddr = "2001:db8:1::1".parse().unwrap();
    let err = parse_notification(&[1, 0], router, true).unwrap_err();
    assert!(err.is_retryable());
}
