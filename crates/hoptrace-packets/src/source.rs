//! Notification source trait.

use async_trait::async_trait;
use hoptrace_core::TracerouteError;
use std::net::IpAddr;

/// Receives inbound error notifications.
#[async_trait]
pub trait Source: Send + Sync {
    /// Returns true if packets are ICMPv6 without a leading IP header.
    fn is_ipv6(&self) -> bool;

    /// Reads one packet into `buf`.
    ///
    /// Returns the number of bytes read and the address of the sender. For
    /// IPv4 the buffer starts at the IP header, for IPv6 at the ICMPv6 header.
    async fn read(&mut self, buf: &mut [u8]) -> Result<(usize, IpAddr), TracerouteError>;
}
