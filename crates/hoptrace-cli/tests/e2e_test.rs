//! End-to-end tests for the hoptrace binary.
//!
//! Tests that open raw sockets are ignored by default; run them with
//! `sudo -E cargo test -- --ignored`.

use serde_json::Value;
use std::process::{Command, Output};

const LOCALHOST_TARGET: &str = "127.0.0.1";

fn hoptrace(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_hoptrace"))
        .args(args)
        .env("RUST_LOG", "warn")
        .output()
        .expect("failed to run hoptrace")
}

#[test]
fn test_help_lists_options() {
    let output = hoptrace(&["--help"]);
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    for flag in ["--max-hops", "--timeout", "--port", "--no-dns", "--strict", "--json", "--output"] {
        assert!(stdout.contains(flag), "missing {} in help", flag);
    }
}

#[test]
fn test_invalid_max_hops_fails_before_probing() {
    let output = hoptrace(&["-m", "0", LOCALHOST_TARGET]);
    assert!(!output.status.success());

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Invalid max hops"), "stderr: {}", stderr);
}

#[test]
fn test_missing_target_is_usage_error() {
    let output = hoptrace(&[]);
    assert!(!output.status.success());
}

#[test]
#[ignore] // Requires root privileges
fn test_localhost_json() {
    let output = hoptrace(&[LOCALHOST_TARGET, "--json", "--no-dns", "-w", "1"]);
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let report: Value = serde_json::from_slice(&output.stdout).expect("valid JSON report");
    assert_eq!(report["destination"], LOCALHOST_TARGET);
    assert_eq!(report["destination_addr"], LOCALHOST_TARGET);
    assert_eq!(report["max_hops"], 30);
    assert_eq!(report["probe_port"], 33434);
    assert_eq!(report["completion"], "reached");

    let hops = report["hops"].as_array().expect("hops array");
    assert_eq!(hops.len(), 1, "localhost should be one hop away");
    assert_eq!(hops[0]["hop"], 1);
    assert_eq!(hops[0]["outcome"], "responded");
    assert_eq!(hops[0]["responder"], LOCALHOST_TARGET);
    assert!(hops[0]["rtt_ms"].as_f64().expect("rtt") >= 0.0);
}

#[test]
#[ignore] // Requires root privileges
fn test_localhost_text_and_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("localhost.txt");
    let path_arg = path.to_str().unwrap();

    let output = hoptrace(&[LOCALHOST_TARGET, "--no-dns", "-w", "1", "-o", path_arg]);
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.starts_with("Traceroute to 127.0.0.1\nHop\tIP"));
    assert!(stdout.contains("1\t127.0.0.1\t127.0.0.1\t\t"));
    assert!(stdout.contains(&format!("Results saved to {}", path_arg)));

    let saved = std::fs::read_to_string(&path).unwrap();
    assert!(saved.starts_with("Traceroute to 127.0.0.1\nMaximum hops: 30\nTimeout: 1 seconds\n"));
    assert!(saved.contains("1\t127.0.0.1\t127.0.0.1\t\t"));
}
