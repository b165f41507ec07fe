//! Probe channels for hoptrace.
//!
//! A hop attempt needs two transient channels: a [`Sink`] that sends the
//! probe datagram with a given hop-limit, and a [`Source`] that receives the
//! ICMP error notifications routers send back. A [`ChannelFactory`] opens
//! both for one hop; dropping the returned [`ProbeChannels`] releases them.

pub mod parser;
pub mod platform;
pub mod sink;
pub mod source;

#[cfg(feature = "testing")]
pub mod testing;

pub use parser::{
    parse_notification, parse_udp_first_bytes, EmbeddedProbe, Notification, NotificationKind,
    UdpInfo,
};
pub use platform::{check_permissions, SocketChannelFactory};
pub use sink::Sink;
pub use source::Source;

use hoptrace_core::TracerouteError;
use std::net::IpAddr;

/// Listening and sending channel pair for a single hop attempt.
pub struct ProbeChannels {
    /// Notification source.
    pub source: Box<dyn Source>,
    /// Probe sink, already configured with the hop-limit.
    pub sink: Box<dyn Sink>,
}

/// Opens the channel pair for one hop attempt.
pub trait ChannelFactory: Send + Sync {
    /// Opens channels for probing `target` with packets that expire after
    /// `hop_limit` routers.
    fn open(&self, target: IpAddr, hop_limit: u8) -> Result<ProbeChannels, TracerouteError>;
}
