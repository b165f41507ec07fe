//! Probe transmission sink trait.

use async_trait::async_trait;
use hoptrace_core::TracerouteError;
use std::net::SocketAddr;

/// Sends probe datagrams.
#[async_trait]
pub trait Sink: Send + Sync {
    /// Sends `payload` as one datagram to `addr`.
    async fn send_to(&mut self, payload: &[u8], addr: SocketAddr) -> Result<(), TracerouteError>;
}
