//! Platform-specific probe channels.

#[cfg(unix)]
pub mod unix;

use crate::{ChannelFactory, ProbeChannels};
use hoptrace_core::TracerouteError;
use std::net::IpAddr;

/// Opens real sockets: a UDP datagram socket with the hop-limit applied and
/// a raw ICMP (or ICMPv6) socket for notifications.
#[derive(Debug, Clone, Copy, Default)]
pub struct SocketChannelFactory;

impl ChannelFactory for SocketChannelFactory {
    fn open(&self, _target: IpAddr, _hop_limit: u8) -> Result<ProbeChannels, TracerouteError> {
        #[cfg(unix)]
        return unix::new_channels(_target, _hop_limit);

        #[cfg(not(unix))]
        return Err(TracerouteError::DriverNotAvailable);
    }
}

/// Checks that the raw notification socket can be opened for this family.
pub fn check_permissions(_ipv6: bool) -> Result<(), TracerouteError> {
    #[cfg(unix)]
    return unix::IcmpSource::new(_ipv6).map(|_| ());

    #[cfg(not(unix))]
    return Err(TracerouteError::DriverNotAvailable);
}
