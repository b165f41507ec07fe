//! Text rendering of hops and result files.

use async_trait::async_trait;
use chrono::{DateTime, TimeZone};
use hoptrace_core::{HopOutcome, HopResult, HopSink, ReverseLookup, TraceConfig};
use std::fs::File;
use std::io::{self, Write};
use std::path::Path;
use tracing::warn;

const SEPARATOR_WIDTH: usize = 60;

pub fn separator() -> String {
    "-".repeat(SEPARATOR_WIDTH)
}

/// Title and column headings printed before the first hop.
pub fn table_header(destination: &str) -> String {
    format!(
        "Traceroute to {}\nHop\tIP\t\t\tHostname\t\tTime\n{}",
        destination,
        separator()
    )
}

/// Run parameters written at the top of a result file.
pub fn file_header(config: &TraceConfig) -> String {
    format!(
        "Traceroute to {}\nMaximum hops: {}\nTimeout: {} seconds\n{}",
        config.destination,
        config.params.max_hops,
        config.params.timeout.as_secs_f64(),
        separator()
    )
}

/// Formats one table row. `name` is the responder's display name.
pub fn format_hop(hop: &HopResult, name: Option<&str>) -> String {
    match (hop.outcome, hop.responder) {
        (HopOutcome::Responded, Some(ip)) => {
            let ip = ip.to_string();
            format!(
                "{}\t{}\t{}\t\t{:.2}ms",
                hop.hop,
                ip,
                name.unwrap_or(&ip),
                hop.rtt_ms.unwrap_or_default()
            )
        }
        (HopOutcome::SendError, _) => format!("{}\t*\t\tSend error", hop.hop),
        _ => format!("{}\t*\t\tRequest timed out", hop.hop),
    }
}

/// File name used when `--output` is given without a value.
///
/// Path separators and colons in the destination are replaced so the name
/// stays a single component.
pub fn default_filename<Tz>(destination: &str, at: &DateTime<Tz>) -> String
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    let safe: String = destination
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' => '_',
            c => c,
        })
        .collect();
    format!("traceroute_{}_{}.txt", safe, at.format("%Y%m%d_%H%M%S"))
}

/// Creates `path` and writes the run parameters to it.
pub fn create_result_file(path: &Path, config: &TraceConfig) -> io::Result<File> {
    let mut file = File::create(path)?;
    writeln!(file, "{}\n", file_header(config))?;
    Ok(file)
}

/// Writes the hop table to any number of outputs as hops arrive.
pub struct TextReporter {
    outputs: Vec<Box<dyn Write + Send>>,
    lookup: Box<dyn ReverseLookup>,
}

impl TextReporter {
    pub fn new(lookup: impl ReverseLookup + 'static) -> Self {
        Self {
            outputs: Vec::new(),
            lookup: Box::new(lookup),
        }
    }

    pub fn with_output(mut self, output: impl Write + Send + 'static) -> Self {
        self.outputs.push(Box::new(output));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.outputs.is_empty()
    }

    /// Writes `line` to every output. Failing outputs are logged and skipped.
    pub fn write_line(&mut self, line: &str) {
        for output in self.outputs.iter_mut() {
            if let Err(e) = writeln!(output, "{}", line).and_then(|_| output.flush()) {
                warn!(error = %e, "Failed to write hop output");
            }
        }
    }
}

#[async_trait]
impl HopSink for TextReporter {
    async fn on_hop(&mut self, hop: &HopResult) {
        let name = match (hop.outcome, hop.responder) {
            (HopOutcome::Responded, Some(ip)) => Some(self.lookup.display_name(ip).await),
            _ => None,
        };
        let line = format_hop(hop, name.as_deref());
        self.write_line(&line);
    }
}
