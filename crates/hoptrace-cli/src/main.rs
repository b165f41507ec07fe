//! CLI for hoptrace.

mod output;
mod runner;

use clap::Parser;
use hoptrace_core::{TraceConfig, TraceParams, TracerouteError};
use hoptrace_udp::Correlation;
use runner::RunOptions;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Exit status used when the trace is interrupted.
const EXIT_INTERRUPTED: u8 = 130;

/// hoptrace - discover the routers between this host and a destination.
#[derive(Parser, Debug)]
#[command(name = "hoptrace")]
#[command(version)]
#[command(about = "Discover the routers between this host and a destination")]
pub struct Args {
    /// Target hostname or IP address.
    #[arg(required = true)]
    pub target: String,

    /// Maximum number of hops to probe.
    #[arg(short = 'm', long = "max-hops", default_value = "30")]
    pub max_hops: u8,

    /// Seconds to wait for each hop.
    #[arg(short = 'w', long, default_value = "2")]
    pub timeout: f64,

    /// Destination port for probes.
    #[arg(short, long, default_value = "33434")]
    pub port: u16,

    /// Prefer IPv6 when resolving the target.
    #[arg(long)]
    pub ipv6: bool,

    /// Do not resolve hop addresses to names.
    #[arg(short = 'n', long = "no-dns")]
    pub no_dns: bool,

    /// Only accept notifications quoting the probe's destination and port.
    #[arg(long)]
    pub strict: bool,

    /// Print the report as JSON.
    #[arg(long)]
    pub json: bool,

    /// Enable verbose logging.
    #[arg(short, long)]
    pub verbose: bool,

    /// Also write the hop table to FILE (generated name if omitted).
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<Option<PathBuf>>,
}

impl Args {
    /// Convert CLI args to run options.
    fn to_options(&self) -> Result<RunOptions, String> {
        let timeout = Duration::try_from_secs_f64(self.timeout)
            .map_err(|_| format!("Invalid timeout: {}", self.timeout))?;

        let config = TraceConfig {
            destination: self.target.clone(),
            params: TraceParams {
                max_hops: self.max_hops,
                timeout,
                probe_port: self.port,
                ..TraceParams::default()
            },
        };
        config.params.validate().map_err(|e| e.to_string())?;

        Ok(RunOptions {
            config,
            want_v6: self.ipv6,
            reverse_dns: !self.no_dns,
            correlation: if self.strict {
                Correlation::Strict
            } else {
                Correlation::Any
            },
            json: self.json,
            output: self.output.clone(),
        })
    }
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    // Logs go to stderr so stdout carries only the report.
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.verbose);

    let options = match args.to_options() {
        Ok(o) => o,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };
    let json = options.json;

    match runner::run_trace(options).await {
        Ok(outcome) => {
            if json {
                match outcome.report.to_json() {
                    Ok(text) => println!("{}", text),
                    Err(e) => {
                        eprintln!("Failed to serialize results: {}", e);
                        return ExitCode::FAILURE;
                    }
                }
            }
            if let Some(path) = outcome.saved_to {
                if json {
                    eprintln!("Results saved to {}", path.display());
                } else {
                    println!("\nResults saved to {}", path.display());
                }
            }
            ExitCode::SUCCESS
        }
        Err(TracerouteError::Cancelled) => {
            eprintln!("Traceroute cancelled");
            ExitCode::from(EXIT_INTERRUPTED)
        }
        Err(e) => {
            eprintln!("Traceroute failed: {}", e);
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(argv: &[&str]) -> Args {
        Args::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_defaults() {
        let options = parse(&["hoptrace", "example.com"]).to_options().unwrap();

        assert_eq!(options.config.destination, "example.com");
        assert_eq!(options.config.params, TraceParams::default());
        assert!(options.reverse_dns);
        assert!(!options.want_v6);
        assert!(!options.json);
        assert_eq!(options.correlation, Correlation::Any);
        assert!(options.output.is_none());
    }

    #[test]
    fn test_flags() {
        let options = parse(&[
            "hoptrace", "-m", "12", "-w", "0.5", "-p", "40000", "--ipv6", "--no-dns", "--strict",
            "--json", "example.com",
        ])
        .to_options()
        .unwrap();

        assert_eq!(options.config.params.max_hops, 12);
        assert_eq!(options.config.params.timeout, Duration::from_millis(500));
        assert_eq!(options.config.params.probe_port, 40000);
        assert!(options.want_v6);
        assert!(!options.reverse_dns);
        assert!(options.json);
        assert_eq!(options.correlation, Correlation::Strict);
    }

    #[test]
    fn test_output_with_and_without_file() {
        let args = parse(&["hoptrace", "example.com", "-o"]);
        assert_eq!(args.output, Some(None));

        let args = parse(&["hoptrace", "example.com", "--output", "run.txt"]);
        assert_eq!(args.output, Some(Some(PathBuf::from("run.txt"))));
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(parse(&["hoptrace", "-m", "0", "x"]).to_options().is_err());
        assert!(parse(&["hoptrace", "-w", "0", "x"]).to_options().is_err());
        assert!(parse(&["hoptrace", "--timeout=-1", "x"]).to_options().is_err());
        assert!(Args::try_parse_from(["hoptrace", "-m", "300", "x"]).is_err());
        assert!(Args::try_parse_from(["hoptrace"]).is_err());
    }
}
