//! Sequential hop-discovery session.
//!
//! Probes hop-limits 1..=max one at a time, waiting for each attempt to
//! resolve before sending the next, and stops at the first hop answered by
//! the destination.

use crate::report::{Completion, TraceReport};
use crate::traits::{Clock, HopSink, Prober, Resolver, SystemClock};
use crate::{HopOutcome, TraceConfig, TracerouteError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Drives a [`Prober`] from hop-limit 1 up to the configured maximum.
pub struct TraceSession<P, R> {
    config: TraceConfig,
    prober: P,
    resolver: R,
    sinks: Vec<Box<dyn HopSink>>,
    clock: Box<dyn Clock>,
    cancel: Option<CancellationToken>,
}

impl<P: Prober, R: Resolver> TraceSession<P, R> {
    /// Creates a session with the wall clock and no sinks.
    pub fn new(config: TraceConfig, prober: P, resolver: R) -> Self {
        Self {
            config,
            prober,
            resolver,
            sinks: Vec::new(),
            clock: Box::new(SystemClock),
            cancel: None,
        }
    }

    /// Registers a sink that receives every hop as soon as it resolves.
    pub fn with_sink(mut self, sink: impl HopSink + 'static) -> Self {
        self.sinks.push(Box::new(sink));
        self
    }

    /// Replaces the clock used to stamp the report.
    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    /// Stops the session between hops once `token` is cancelled.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn config(&self) -> &TraceConfig {
        &self.config
    }

    /// Runs the session to completion.
    ///
    /// Only resolution, configuration and cancellation errors are returned;
    /// per-hop failures are recorded in the report.
    pub async fn run(&mut self) -> Result<TraceReport, TracerouteError> {
        let params = self.config.params.clone();
        params.validate()?;

        let destination_addr = self.resolver.resolve(&self.config.destination).await?;
        info!(
            destination = %self.config.destination,
            addr = %destination_addr,
            max_hops = params.max_hops,
            "Starting trace"
        );

        let started_at = self.clock.now();
        let mut hops = Vec::with_capacity(params.max_hops as usize);
        let mut completion = Completion::Exhausted;

        for hop_limit in 1..=params.max_hops {
            self.check_cancelled()?;

            let hop_start = tokio::time::Instant::now();
            let request = params.request(destination_addr, hop_limit);

            debug!(ttl = hop_limit, "Sending probe");
            let mut result = self.prober.attempt(&request).await;
            if result.hop != hop_limit {
                warn!(
                    ttl = hop_limit,
                    reported = result.hop,
                    "Prober returned a different hop number, correcting"
                );
                result.hop = hop_limit;
            }

            match result.outcome {
                HopOutcome::Responded => debug!(
                    ttl = hop_limit,
                    ip = ?result.responder,
                    rtt_ms = result.rtt_ms,
                    "Received probe response"
                ),
                HopOutcome::TimedOut => debug!(ttl = hop_limit, "Timeout waiting for response"),
                HopOutcome::SendError => warn!(ttl = hop_limit, "Probe could not be sent"),
            }

            for sink in self.sinks.iter_mut() {
                sink.on_hop(&result).await;
            }

            let reached = result.is_from(destination_addr);
            hops.push(result);
            if reached {
                debug!(ttl = hop_limit, "Reached destination, stopping");
                completion = Completion::Reached;
                break;
            }

            // Ensure minimum delay between probes
            let elapsed = hop_start.elapsed();
            if hop_limit < params.max_hops && elapsed < params.send_delay {
                pause(self.cancel.as_ref(), params.send_delay - elapsed).await?;
            }
        }

        info!(
            hops = hops.len(),
            reached = completion == Completion::Reached,
            "Trace finished"
        );

        Ok(TraceReport {
            destination: self.config.destination.clone(),
            destination_addr,
            max_hops: params.max_hops,
            timeout: params.timeout,
            probe_port: params.probe_port,
            started_at,
            completion,
            hops,
        })
    }

    fn check_cancelled(&self) -> Result<(), TracerouteError> {
        match &self.cancel {
            Some(token) if token.is_cancelled() => {
                debug!("Trace cancelled between hops");
                Err(TracerouteError::Cancelled)
            }
            _ => Ok(()),
        }
    }
}

async fn pause(
    cancel: Option<&CancellationToken>,
    delay: std::time::Duration,
) -> Result<(), TracerouteError> {
    match cancel {
        Some(token) => tokio::select! {
            _ = token.cancelled() => Err(TracerouteError::Cancelled),
            _ = tokio::time::sleep(delay) => Ok(()),
        },
        None => {
            tokio::time::sleep(delay).await;
            Ok(())
        }
    }
}
