//! UDP prober for hoptrace.
//!
//! Sends an empty UDP datagram to an unlikely port with a limited hop-limit
//! and waits for the ICMP error it provokes.

mod prober;

pub use prober::{Correlation, UdpProber};
