//! UDP probe-and-listen implementation of [`Prober`].

use async_trait::async_trait;
use hoptrace_core::{HopOutcome, HopResult, ProbeRequest, Prober, TracerouteError};
use hoptrace_packets::{
    parse_notification, ChannelFactory, Notification, SocketChannelFactory, Source,
};
use std::net::SocketAddr;
use tokio::time::Instant;
use tracing::{debug, trace, warn};

/// Large enough for an outer IP header, ICMP header and a full quoted datagram.
const RECV_BUFFER_LEN: usize = 1500;

/// How inbound notifications are matched to the outstanding probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Correlation {
    /// Any notification received during the wait answers the hop. On IPv6
    /// only Time Exceeded and Destination Unreachable count, since the ICMPv6
    /// socket also sees neighbor discovery and multicast listener traffic.
    #[default]
    Any,
    /// Only Time Exceeded / Destination Unreachable messages quoting a
    /// datagram sent to the probed destination and port are accepted.
    Strict,
}

/// Prober sending one zero-payload UDP datagram per attempt.
///
/// Every attempt opens its own channels through the [`ChannelFactory`] and
/// drops them before returning.
pub struct UdpProber<F = SocketChannelFactory> {
    factory: F,
    correlation: Correlation,
}

impl UdpProber<SocketChannelFactory> {
    /// Creates a prober on real sockets.
    pub fn new() -> Self {
        Self::with_factory(SocketChannelFactory)
    }
}

impl Default for UdpProber<SocketChannelFactory> {
    fn default() -> Self {
        Self::new()
    }
}

impl<F: ChannelFactory> UdpProber<F> {
    /// Creates a prober opening channels through `factory`.
    pub fn with_factory(factory: F) -> Self {
        Self {
            factory,
            correlation: Correlation::Any,
        }
    }

    /// Sets how notifications are matched to the probe.
    pub fn with_correlation(mut self, correlation: Correlation) -> Self {
        self.correlation = correlation;
        self
    }

    pub fn correlation(&self) -> Correlation {
        self.correlation
    }

    fn accepts(&self, notification: &Notification, request: &ProbeRequest, ipv6: bool) -> bool {
        match self.correlation {
            Correlation::Any => !ipv6 || notification.is_error(),
            Correlation::Strict => notification.matches_probe(request.destination, request.port),
        }
    }

    /// Reads until an acceptable notification arrives, returning it with its
    /// arrival time. Unparseable and non-matching packets are skipped.
    async fn listen(
        &self,
        source: &mut dyn Source,
        request: &ProbeRequest,
    ) -> Result<(Notification, Instant), TracerouteError> {
        let mut buffer = vec![0u8; RECV_BUFFER_LEN];
        loop {
            let (n, from) = source.read(&mut buffer).await?;
            let arrival = Instant::now();

            let ipv6 = source.is_ipv6();
            match parse_notification(&buffer[..n], from, ipv6) {
                Ok(notification) if self.accepts(&notification, request, ipv6) => {
                    return Ok((notification, arrival));
                }
                Ok(notification) => {
                    trace!(
                        ttl = request.hop_limit,
                        from = %notification.responder,
                        icmp_type = notification.icmp_type,
                        "Ignored notification not matching probe"
                    );
                }
                Err(e) if e.is_retryable() => {
                    debug!(ttl = request.hop_limit, from = %from, error = %e, "Skipping malformed packet");
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[async_trait]
impl<F: ChannelFactory> Prober for UdpProber<F> {
    async fn attempt(&self, request: &ProbeRequest) -> HopResult {
        let hop = request.hop_limit;

        let mut channels = match self.factory.open(request.destination, hop) {
            Ok(channels) => channels,
            Err(e) => {
                warn!(ttl = hop, error = %e, "Failed to open probe channels");
                return HopResult::send_error(hop);
            }
        };

        let target = SocketAddr::new(request.destination, request.port);
        let send_time = Instant::now();

        trace!(ttl = hop, target = %target, "Sending UDP probe");
        if let Err(e) = channels.sink.send_to(&[], target).await {
            warn!(ttl = hop, error = %e, "Failed to send probe");
            return HopResult::send_error(hop);
        }

        let waited = tokio::time::timeout(
            request.timeout,
            self.listen(channels.source.as_mut(), request),
        )
        .await;

        match waited {
            Ok(Ok((notification, arrival))) => {
                let rtt = arrival.duration_since(send_time);
                trace!(
                    ttl = hop,
                    ip = %notification.responder,
                    rtt_ms = rtt.as_secs_f64() * 1000.0,
                    icmp_type = notification.icmp_type,
                    icmp_code = notification.icmp_code,
                    "Received notification"
                );
                HopResult::responded(hop, notification.responder, rtt)
                    .with_icmp(notification.icmp_type, notification.icmp_code)
            }
            Ok(Err(e)) => {
                debug!(ttl = hop, error = %e, "Listening failed");
                match e.hop_outcome() {
                    HopOutcome::SendError => HopResult::send_error(hop),
                    _ => HopResult::timed_out(hop),
                }
            }
            Err(_) => HopResult::timed_out(hop),
        }
    }
}
