//! Core types, traits, and the hop-discovery session for hoptrace.
//!
//! - [`Prober`] trait for single probe-and-listen attempts
//! - [`TraceSession`] driving hop-limits from 1 upward
//! - [`TraceReport`] and [`HopResult`] describing the discovered path
//! - [`TracerouteError`] for error handling

pub mod error;
pub mod report;
pub mod session;
pub mod traits;
pub mod types;

pub use error::TracerouteError;
pub use report::{Completion, TraceReport};
pub use session::TraceSession;
pub use traits::{
    Clock, FixedClock, HopSink, LiteralResolver, NoReverseLookup, Prober, Resolver, ReverseLookup,
    SystemClock,
};
pub use types::{
    HopOutcome, HopResult, ProbeRequest, TraceConfig, TraceParams, DEFAULT_MAX_HOPS,
    DEFAULT_PROBE_PORT, DEFAULT_TIMEOUT,
};
