//! Unix probe channels on socket2 sockets driven by tokio's `AsyncFd`.

use crate::{ProbeChannels, Sink, Source};
use async_trait::async_trait;
use hoptrace_core::TracerouteError;
use socket2::{Domain, Protocol, SockAddr, Socket, Type};
use std::io;
use std::mem::MaybeUninit;
use std::net::{IpAddr, SocketAddr};
use tokio::io::unix::AsyncFd;
use tracing::trace;

/// Raw ICMP/ICMPv6 socket receiving error notifications.
///
/// Requires root or `CAP_NET_RAW`.
pub struct IcmpSource {
    fd: AsyncFd<Socket>,
    ipv6: bool,
}

impl IcmpSource {
    pub fn new(ipv6: bool) -> Result<Self, TracerouteError> {
        let (domain, protocol) = if ipv6 {
            (Domain::IPV6, Protocol::ICMPV6)
        } else {
            (Domain::IPV4, Protocol::ICMPV4)
        };

        let socket =
            Socket::new(domain, Type::RAW, Some(protocol)).map_err(TracerouteError::SocketCreation)?;
        socket
            .set_nonblocking(true)
            .map_err(|source| TracerouteError::SocketOption {
                option: "O_NONBLOCK",
                source,
            })?;

        let fd = AsyncFd::new(socket).map_err(TracerouteError::SocketCreation)?;
        Ok(Self { fd, ipv6 })
    }
}

#[async_trait]
impl Source for IcmpSource {
    fn is_ipv6(&self) -> bool {
        self.ipv6
    }

    async fn read(&mut self, buf: &mut [u8]) -> Result<(usize, IpAddr), TracerouteError> {
        loop {
            let mut guard = self.fd.readable().await?;
            match guard.try_io(|inner| recv_from(inner.get_ref(), buf)) {
                Ok(Ok((n, addr))) => {
                    let from = addr.as_socket().map(|a| a.ip()).ok_or_else(|| {
                        TracerouteError::MalformedPacket("sender is not an IP address".to_string())
                    })?;
                    trace!(bytes = n, from = %from, "Read ICMP packet");
                    return Ok((n, from));
                }
                Ok(Err(e)) => return Err(TracerouteError::from(e)),
                Err(_would_block) => continue,
            }
        }
    }
}

/// UDP datagram socket whose packets expire after a fixed hop-limit.
pub struct UdpSink {
    fd: AsyncFd<Socket>,
}

impl UdpSink {
    pub fn new(target: IpAddr, hop_limit: u8) -> Result<Self, TracerouteError> {
        let domain = match target {
            IpAddr::V4(_) => Domain::IPV4,
            IpAddr::V6(_) => Domain::IPV6,
        };

        let socket = Socket::new(domain, Type::DGRAM, Some(Protocol::UDP))
            .map_err(TracerouteError::SocketCreation)?;

        match target {
            IpAddr::V4(_) => socket.set_ttl(hop_limit as u32).map_err(|source| {
                TracerouteError::SocketOption {
                    option: "IP_TTL",
                    source,
                }
            })?,
            IpAddr::V6(_) => socket
                .set_unicast_hops_v6(hop_limit as u32)
                .map_err(|source| TracerouteError::SocketOption {
                    option: "IPV6_UNICAST_HOPS",
                    source,
                })?,
        }

        socket
            .set_nonblocking(true)
            .map_err(|source| TracerouteError::SocketOption {
                option: "O_NONBLOCK",
                source,
            })?;

        let fd = AsyncFd::new(socket).map_err(TracerouteError::SocketCreation)?;
        Ok(Self { fd })
    }
}

#[async_trait]
impl Sink for UdpSink {
    async fn send_to(&mut self, payload: &[u8], addr: SocketAddr) -> Result<(), TracerouteError> {
        let target = SockAddr::from(addr);
        loop {
            let mut guard = self
                .fd
                .writable()
                .await
                .map_err(TracerouteError::WriteFailed)?;
            match guard.try_io(|inner| inner.get_ref().send_to(payload, &target)) {
                Ok(Ok(_)) => return Ok(()),
                Ok(Err(e)) => return Err(TracerouteError::WriteFailed(e)),
                Err(_would_block) => continue,
            }
        }
    }
}

/// Opens the listening socket before the sending one so a fast reply
/// cannot arrive before anything is listening.
pub fn new_channels(target: IpAddr, hop_limit: u8) -> Result<ProbeChannels, TracerouteError> {
    let source = IcmpSource::new(target.is_ipv6())?;
    let sink = UdpSink::new(target, hop_limit)?;

    Ok(ProbeChannels {
        source: Box::new(source),
        sink: Box::new(sink),
    })
}

fn recv_from(socket: &Socket, buf: &mut [u8]) -> io::Result<(usize, SockAddr)> {
    // SAFETY: `recv_from` only writes initialized bytes, and `MaybeUninit<u8>`
    // has the same layout as `u8`.
    let uninit = unsafe { &mut *(buf as *mut [u8] as *mut [MaybeUninit<u8>]) };
    socket.recv_from(uninit)
}
