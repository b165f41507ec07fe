//! Core types for hop discovery.

use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::time::Duration;

/// Default upper bound on the hop-limit.
pub const DEFAULT_MAX_HOPS: u8 = 30;
/// Default per-hop wait bound.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(2);
/// Default destination port, chosen to be unlikely to have a listener.
pub const DEFAULT_PROBE_PORT: u16 = 33434;

/// A single probe-and-listen request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeRequest {
    /// Resolved destination address.
    pub destination: IpAddr,
    /// Hop-limit (TTL) written into the outbound probe.
    pub hop_limit: u8,
    /// Destination port targeted by the probe.
    pub port: u16,
    /// How long to wait for a notification.
    pub timeout: Duration,
}

/// How a hop attempt resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HopOutcome {
    /// A notification arrived within the timeout.
    Responded,
    /// No usable notification arrived within the timeout.
    TimedOut,
    /// The probe could not be sent (channel setup or write failure).
    SendError,
}

impl std::fmt::Display for HopOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HopOutcome::Responded => write!(f, "responded"),
            HopOutcome::TimedOut => write!(f, "timed_out"),
            HopOutcome::SendError => write!(f, "send_error"),
        }
    }
}

/// Result of one hop attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HopResult {
    /// Hop number (equal to the hop-limit that produced it).
    pub hop: u8,
    /// Address that sent the notification.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub responder: Option<IpAddr>,
    /// Round-trip latency in milliseconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rtt_ms: Option<f64>,
    /// Outcome tag.
    pub outcome: HopOutcome,
    /// ICMP type of the answering notification.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icmp_type: Option<u8>,
    /// ICMP code of the answering notification.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icmp_code: Option<u8>,
}

impl HopResult {
    /// A hop answered by `responder` after `rtt`.
    pub fn responded(hop: u8, responder: IpAddr, rtt: Duration) -> Self {
        Self {
            hop,
            responder: Some(responder),
            rtt_ms: Some(rtt.as_secs_f64() * 1000.0),
            outcome: HopOutcome::Responded,
            icmp_type: None,
            icmp_code: None,
        }
    }

    /// A hop with no usable notification.
    pub fn timed_out(hop: u8) -> Self {
        Self::failed(hop, HopOutcome::TimedOut)
    }

    /// A hop whose probe could not be sent.
    pub fn send_error(hop: u8) -> Self {
        Self::failed(hop, HopOutcome::SendError)
    }

    fn failed(hop: u8, outcome: HopOutcome) -> Self {
        Self {
            hop,
            responder: None,
            rtt_ms: None,
            outcome,
            icmp_type: None,
            icmp_code: None,
        }
    }

    /// Attaches the ICMP type/code of the notification.
    pub fn with_icmp(mut self, icmp_type: u8, icmp_code: u8) -> Self {
        self.icmp_type = Some(icmp_type);
        self.icmp_code = Some(icmp_code);
        self
    }

    /// Returns true if this hop was answered by `addr`.
    pub fn is_from(&self, addr: IpAddr) -> bool {
        self.responder == Some(addr)
    }

    /// Returns true if a notification answered this hop.
    pub fn is_responded(&self) -> bool {
        self.outcome == HopOutcome::Responded
    }
}

/// Parameters for a hop-discovery session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceParams {
    /// Maximum hop-limit to probe.
    pub max_hops: u8,
    /// Per-hop wait bound.
    #[serde(with = "duration_secs")]
    pub timeout: Duration,
    /// Destination port targeted by probes.
    pub probe_port: u16,
    /// Minimum delay between consecutive hops.
    #[serde(with = "duration_secs")]
    pub send_delay: Duration,
}

impl Default for TraceParams {
    fn default() -> Self {
        Self {
            max_hops: DEFAULT_MAX_HOPS,
            timeout: DEFAULT_TIMEOUT,
            probe_port: DEFAULT_PROBE_PORT,
            send_delay: Duration::ZERO,
        }
    }
}

impl TraceParams {
    /// Validates the parameters.
    pub fn validate(&self) -> Result<(), crate::TracerouteError> {
        if self.max_hops == 0 {
            return Err(crate::TracerouteError::InvalidMaxHops(self.max_hops));
        }
        if self.timeout.is_zero() {
            return Err(crate::TracerouteError::InvalidTimeout(self.timeout));
        }
        Ok(())
    }

    /// Builds the request for one hop-limit against a resolved destination.
    pub fn request(&self, destination: IpAddr, hop_limit: u8) -> ProbeRequest {
        ProbeRequest {
            destination,
            hop_limit,
            port: self.probe_port,
            timeout: self.timeout,
        }
    }
}

/// High-level session configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct TraceConfig {
    /// Target hostname or IP address, as given by the user.
    pub destination: String,
    /// Session parameters.
    pub params: TraceParams,
}

impl TraceConfig {
    pub fn new(destination: impl Into<String>) -> Self {
        Self {
            destination: destination.into(),
            params: TraceParams::default(),
        }
    }
}

/// Serde helper for durations as float seconds.
pub(crate) mod duration_secs {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_secs_f64().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }
}
