//! The ordered hop report produced by a session.

use crate::types::duration_secs;
use crate::HopResult;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::time::Duration;

/// Why a session stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Completion {
    /// A hop was answered by the destination itself.
    Reached,
    /// Every hop-limit up to the maximum was probed without reaching it.
    Exhausted,
}

/// Complete result of one session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceReport {
    /// Destination as given by the user.
    pub destination: String,
    /// Address the destination resolved to.
    pub destination_addr: IpAddr,
    /// Maximum hop-limit configured for the run.
    pub max_hops: u8,
    /// Per-hop wait bound.
    #[serde(with = "duration_secs")]
    pub timeout: Duration,
    /// Destination port targeted by probes.
    pub probe_port: u16,
    /// When the session started.
    pub started_at: DateTime<Utc>,
    /// Why the session stopped.
    pub completion: Completion,
    /// Hops in order, numbered from 1.
    pub hops: Vec<HopResult>,
}

impl TraceReport {
    /// Returns true if the destination answered.
    pub fn reached_destination(&self) -> bool {
        self.completion == Completion::Reached
    }

    /// Returns the last recorded hop.
    pub fn last_hop(&self) -> Option<&HopResult> {
        self.hops.last()
    }

    /// Number of hops that were answered.
    pub fn responded_count(&self) -> usize {
        self.hops.iter().filter(|h| h.is_responded()).count()
    }

    /// Serializes the report to JSON with indentation.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::net::Ipv4Addr;

    fn sample() -> TraceReport {
        let dest = IpAddr::V4(Ipv4Addr::new(192, 0, 2, 9));
        TraceReport {
            destination: "example.com".to_string(),
            destination_addr: dest,
            max_hops: 30,
            timeout: Duration::from_secs(2),
            probe_port: 33434,
            started_at: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
            completion: Completion::Reached,
            hops: vec![
                HopResult::timed_out(1),
                HopResult::responded(2, dest, Duration::from_millis(8)),
            ],
        }
    }

    #[test]
    fn test_report_accessors() {
        let report = sample();
        assert!(report.reached_destination());
        assert_eq!(report.responded_count(), 1);
        assert_eq!(report.last_hop().map(|h| h.hop), Some(2));
    }

    #[test]
    fn test_report_serialization() {
        let json = sample().to_json().unwrap();
        assert!(json.contains("\"destination\": \"example.com\""));
        assert!(json.contains("\"completion\": \"reached\""));
        assert!(json.contains("\"timeout\": 2.0"));
        assert!(json.contains("\"outcome\": \"timed_out\""));

        let back: TraceReport = serde_json::from_str(&json).unwrap();
        assert_eq!(back, sample());
    }
}
