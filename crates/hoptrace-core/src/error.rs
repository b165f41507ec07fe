//! Error types for hop discovery.

use crate::types::HopOutcome;
use thiserror::Error;

/// Main error type for hoptrace operations.
#[derive(Error, Debug)]
pub enum TracerouteError {
    // Channel errors
    #[error("Failed to create socket: {0}")]
    SocketCreation(#[source] std::io::Error),

    #[error("Failed to set socket option {option}: {source}")]
    SocketOption {
        option: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("Read timeout exceeded")]
    ReadTimeout,

    #[error("Write failed: {0}")]
    WriteFailed(#[source] std::io::Error),

    // Packet errors
    #[error("Packet too short: expected at least {expected} bytes, got {actual}")]
    PacketTooShort { expected: usize, actual: usize },

    #[error("Failed to parse {layer} layer: {reason}")]
    PacketParseFailed { layer: &'static str, reason: String },

    #[error("Packet did not match probe")]
    PacketMismatch,

    #[error("Malformed packet: {0}")]
    MalformedPacket(String),

    // DNS errors
    #[error("Failed to resolve hostname {hostname}: {source}")]
    DnsResolutionFailed {
        hostname: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("No addresses found for {hostname}")]
    NoAddresses { hostname: String },

    // Configuration errors
    #[error("Invalid max hops: {0} (must be at least 1)")]
    InvalidMaxHops(u8),

    #[error("Invalid timeout: {0:?} (must be greater than zero)")]
    InvalidTimeout(std::time::Duration),

    #[error("Driver not available on this platform")]
    DriverNotAvailable,

    // Internal errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Operation cancelled")]
    Cancelled,
}

impl TracerouteError {
    /// Returns true if this error is retryable while waiting for a notification.
    ///
    /// Raw ICMP sockets see every ICMP packet that reaches the host, so
    /// unrelated or unparseable traffic must not end the wait early.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::PacketMismatch
                | Self::MalformedPacket(_)
                | Self::PacketParseFailed { .. }
                | Self::PacketTooShort { .. }
        )
    }

    /// Returns true if this error aborts a whole session rather than a single hop.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::DnsResolutionFailed { .. }
                | Self::NoAddresses { .. }
                | Self::InvalidMaxHops(_)
                | Self::InvalidTimeout(_)
                | Self::Cancelled
        )
    }

    /// Maps a per-hop error onto the outcome recorded for that hop.
    pub fn hop_outcome(&self) -> HopOutcome {
        match self {
            Self::SocketCreation(_)
            | Self::SocketOption { .. }
            | Self::WriteFailed(_)
            | Self::DriverNotAvailable => HopOutcome::SendError,
            _ => HopOutcome::TimedOut,
        }
    }
}

impl From<std::io::Error> for TracerouteError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::TimedOut => TracerouteError::ReadTimeout,
            std::io::ErrorKind::WouldBlock => TracerouteError::ReadTimeout,
            _ => TracerouteError::Internal(err.to_string()),
        }
    }
}
