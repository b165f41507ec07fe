//! Traits at the seams of a hop-discovery session.

use crate::{HopResult, ProbeRequest, TracerouteError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::net::IpAddr;

/// Executes exactly one probe-and-listen cycle.
///
/// Implementations never retry internally and never fail: channel setup and
/// send problems are reported as [`HopOutcome::SendError`](crate::HopOutcome),
/// a silent hop as [`HopOutcome::TimedOut`](crate::HopOutcome).
#[async_trait]
pub trait Prober: Send + Sync {
    /// Sends one probe with `request.hop_limit` and waits up to `request.timeout`.
    async fn attempt(&self, request: &ProbeRequest) -> HopResult;
}

#[async_trait]
impl<P: Prober + ?Sized> Prober for Box<P> {
    async fn attempt(&self, request: &ProbeRequest) -> HopResult {
        (**self).attempt(request).await
    }
}

/// Name-to-address resolution.
#[async_trait]
pub trait Resolver: Send + Sync {
    /// Resolves a hostname or literal address to one routable address.
    async fn resolve(&self, host: &str) -> Result<IpAddr, TracerouteError>;
}

/// Resolver that only accepts literal IP addresses.
#[derive(Debug, Clone, Copy, Default)]
pub struct LiteralResolver;

#[async_trait]
impl Resolver for LiteralResolver {
    async fn resolve(&self, host: &str) -> Result<IpAddr, TracerouteError> {
        host.parse::<IpAddr>()
            .map_err(|e| TracerouteError::DnsResolutionFailed {
                hostname: host.to_string(),
                source: Box::new(e),
            })
    }
}

/// Address-to-name lookup used by presentation layers.
#[async_trait]
pub trait ReverseLookup: Send + Sync {
    /// Returns a display name for `ip`, or `None` if there is none.
    async fn lookup(&self, ip: IpAddr) -> Option<String>;

    /// Returns a display name for `ip`, falling back to the literal address.
    async fn display_name(&self, ip: IpAddr) -> String {
        match self.lookup(ip).await {
            Some(name) => name,
            None => ip.to_string(),
        }
    }
}

/// Reverse lookup that never resolves anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoReverseLookup;

#[async_trait]
impl ReverseLookup for NoReverseLookup {
    async fn lookup(&self, _ip: IpAddr) -> Option<String> {
        None
    }
}

/// Receives each hop as soon as it resolves.
#[async_trait]
pub trait HopSink: Send {
    async fn on_hop(&mut self, hop: &HopResult);
}

#[async_trait]
impl HopSink for Vec<HopResult> {
    async fn on_hop(&mut self, hop: &HopResult) {
        self.push(hop.clone());
    }
}

#[async_trait]
impl HopSink for tokio::sync::mpsc::UnboundedSender<HopResult> {
    async fn on_hop(&mut self, hop: &HopResult) {
        // A dropped receiver only means nobody is listening anymore.
        let _ = self.send(hop.clone());
    }
}

/// Source of the session start timestamp.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock pinned to one instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    #[tokio::test]
    async fn test_literal_resolver() {
        let ip = LiteralResolver.resolve("192.0.2.7").await.unwrap();
        assert_eq!(ip, IpAddr::V4(Ipv4Addr::new(192, 0, 2, 7)));

        let err = LiteralResolver.resolve("example.com").await.unwrap_err();
        assert!(matches!(err, TracerouteError::DnsResolutionFailed { .. }));
    }

    #[tokio::test]
    async fn test_display_name_falls_back_to_literal() {
        let ip = IpAddr::V4(Ipv4Addr::new(10, 1, 2, 3));
        assert_eq!(NoReverseLookup.display_name(ip).await, "10.1.2.3");
    }

    #[tokio::test]
    async fn test_channel_sink_forwards_hops() {
        let (mut tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        tx.on_hop(&HopResult::timed_out(1)).await;
        assert_eq!(rx.recv().await, Some(HopResult::timed_out(1)));

        drop(rx);
        // Must not panic once the receiver is gone.
        tx.on_hop(&HopResult::timed_out(2)).await;
    }
}
