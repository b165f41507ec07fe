//! Runner that wires DNS, probing and output together for one trace.

use crate::output::{create_result_file, default_filename, table_header, TextReporter};
use async_trait::async_trait;
use chrono::Local;
use hickory_resolver::config::{ResolverConfig, ResolverOpts};
use hickory_resolver::TokioAsyncResolver;
use hoptrace_core::{
    NoReverseLookup, Resolver, ReverseLookup, TraceConfig, TraceReport, TraceSession,
    TracerouteError,
};
use hoptrace_packets::check_permissions;
use hoptrace_udp::{Correlation, UdpProber};
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Everything the CLI decided before starting a trace.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub config: TraceConfig,
    pub want_v6: bool,
    pub reverse_dns: bool,
    pub correlation: Correlation,
    /// Print JSON instead of the hop table.
    pub json: bool,
    /// `Some(None)` writes to a generated file name.
    pub output: Option<Option<PathBuf>>,
}

/// Result of a completed run.
#[derive(Debug)]
pub struct RunOutcome {
    pub report: TraceReport,
    /// Result file that received the hop table, if any.
    pub saved_to: Option<PathBuf>,
}

fn system_resolver() -> TokioAsyncResolver {
    TokioAsyncResolver::tokio_from_system_conf().unwrap_or_else(|e| {
        warn!(error = %e, "Failed to read system DNS configuration, using defaults");
        TokioAsyncResolver::tokio(ResolverConfig::default(), ResolverOpts::default())
    })
}

/// Picks the first address of the preferred family, falling back to the
/// first address of any family.
fn pick_address(addrs: impl IntoIterator<Item = IpAddr>, want_v6: bool) -> Option<IpAddr> {
    let mut first = None;
    for ip in addrs {
        if ip.is_ipv6() == want_v6 {
            return Some(ip);
        }
        first.get_or_insert(ip);
    }
    first
}

/// Forward resolution through hickory.
pub struct HickoryResolver {
    resolver: TokioAsyncResolver,
    want_v6: bool,
}

impl HickoryResolver {
    pub fn new(want_v6: bool) -> Self {
        Self {
            resolver: system_resolver(),
            want_v6,
        }
    }
}

#[async_trait]
impl Resolver for HickoryResolver {
    async fn resolve(&self, host: &str) -> Result<IpAddr, TracerouteError> {
        // First check if it's already an IP address
        if let Ok(ip) = host.parse::<IpAddr>() {
            return Ok(ip);
        }

        let lookup = self
            .resolver
            .lookup_ip(host)
            .await
            .map_err(|e| TracerouteError::DnsResolutionFailed {
                hostname: host.to_string(),
                source: Box::new(e),
            })?;

        pick_address(lookup.iter(), self.want_v6).ok_or_else(|| TracerouteError::NoAddresses {
            hostname: host.to_string(),
        })
    }
}

/// PTR lookups through hickory.
pub struct HickoryReverseLookup {
    resolver: TokioAsyncResolver,
}

impl HickoryReverseLookup {
    pub fn new() -> Self {
        Self {
            resolver: system_resolver(),
        }
    }
}

impl Default for HickoryReverseLookup {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ReverseLookup for HickoryReverseLookup {
    async fn lookup(&self, ip: IpAddr) -> Option<String> {
        match self.resolver.reverse_lookup(ip).await {
            Ok(names) => names
                .iter()
                .next()
                .map(|name| name.to_string().trim_end_matches('.').to_string()),
            Err(e) => {
                debug!(ip = %ip, error = %e, "Reverse lookup failed");
                None
            }
        }
    }
}

/// Resolver that checks raw-socket access for the family it resolved to.
pub struct CheckedResolver<R, C> {
    inner: R,
    check: C,
}

impl<R, C> CheckedResolver<R, C>
where
    R: Resolver,
    C: Fn(bool) -> Result<(), TracerouteError> + Send + Sync,
{
    pub fn new(inner: R, check: C) -> Self {
        Self { inner, check }
    }
}

#[async_trait]
impl<R, C> Resolver for CheckedResolver<R, C>
where
    R: Resolver,
    C: Fn(bool) -> Result<(), TracerouteError> + Send + Sync,
{
    async fn resolve(&self, host: &str) -> Result<IpAddr, TracerouteError> {
        let addr = self.inner.resolve(host).await?;
        if let Err(e) = (self.check)(addr.is_ipv6()) {
            warn!(
                addr = %addr,
                error = %e,
                "Cannot open raw ICMP socket (root or CAP_NET_RAW needed), every hop will fail"
            );
        }
        Ok(addr)
    }
}

/// Removes the result file when the run failed before any hop was written.
/// An interrupted run keeps the rows it already streamed.
fn discard_on_fatal(path: &Path, err: &TracerouteError) {
    if !err.is_fatal() || matches!(err, TracerouteError::Cancelled) {
        return;
    }
    match std::fs::remove_file(path) {
        Ok(()) => debug!(path = %path.display(), "Removed result file of failed run"),
        Err(e) => warn!(path = %path.display(), error = %e, "Failed to remove result file"),
    }
}

/// Cancels `token` on Ctrl-C.
fn cancel_on_interrupt(token: CancellationToken) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, stopping after the current hop");
            token.cancel();
        }
    })
}

/// Runs one trace, streaming the hop table to stdout and the result file.
pub async fn run_trace(options: RunOptions) -> Result<RunOutcome, TracerouteError> {
    let config = options.config;

    let saved_to = options.output.map(|path| {
        path.unwrap_or_else(|| PathBuf::from(default_filename(&config.destination, &Local::now())))
    });

    let mut reporter = if options.reverse_dns {
        TextReporter::new(HickoryReverseLookup::new())
    } else {
        TextReporter::new(NoReverseLookup)
    };
    if !options.json {
        reporter = reporter.with_output(std::io::stdout());
    }
    if let Some(path) = &saved_to {
        let file = create_result_file(path, &config).map_err(|e| {
            TracerouteError::Internal(format!("Failed to create {}: {}", path.display(), e))
        })?;
        debug!(path = %path.display(), "Writing results to file");
        reporter = reporter.with_output(file);
    }

    let token = CancellationToken::new();
    let interrupt = cancel_on_interrupt(token.clone());

    let prober = UdpProber::new().with_correlation(options.correlation);
    let resolver = CheckedResolver::new(HickoryResolver::new(options.want_v6), check_permissions);
    let mut session = TraceSession::new(config, prober, resolver).with_cancellation(token);

    if !reporter.is_empty() {
        reporter.write_line(&table_header(&session.config().destination));
        session = session.with_sink(reporter);
    }

    let result = session.run().await;
    interrupt.abort();

    let report = match result {
        Ok(report) => report,
        Err(e) => {
            if let Some(path) = &saved_to {
                discard_on_fatal(path, &e);
            }
            return Err(e);
        }
    };
    Ok(RunOutcome { report, saved_to })
}
