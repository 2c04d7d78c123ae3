//! Logging and tracing setup

use super::support::{start_blocking_server, MockBehavior, MockServer};
use assert_cmd::Command;
use tempfile::TempDir;
use tracing_subscriber::EnvFilter;
use waveform_downloader::downloader::{spawn_session, SessionConfig, TerminalState};
use waveform_downloader::output::MemorySink;
use waveform_downloader::DataRequest;

#[test]
fn test_env_filter_parsing() {
    let _ = EnvFilter::new("info");
    let _ = EnvFilter::new("waveform_downloader=debug");
    let _ = EnvFilter::new("warn,waveform_downloader::downloader=trace");
}

#[tokio::test]
async fn test_session_runs_under_debug_subscriber() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new("waveform_downloader=trace"))
        .with_test_writer()
        .try_init();

    let server = MockServer::start(MockBehavior::complete(1)).await;
    let request = DataRequest::new(
        "127.0.0.1",
        server.port,
        "BBSR.00-BHZ",
        "2010/01/12",
        "14:00:00",
        60,
        100_000_000,
    )
    .unwrap();

    let summary = spawn_session(request, SessionConfig::default(), MemorySink::new())
        .join()
        .await
        .unwrap();
    assert_eq!(summary.state, TerminalState::Completed);
    server.finish().await;
}

#[test]
fn test_json_logs_go_to_stderr() {
    let (port, server) = start_blocking_server(MockBehavior::complete(1));
    let dir = TempDir::new().unwrap();
    let out = dir.path().join("out.mseed");

    let assert = Command::cargo_bin("waveform-downloader")
        .unwrap()
        .env("LOG_FORMAT", "json")
        .env("RUST_LOG", "waveform_downloader=info")
        .args([
            "--no-progress",
            "get",
            "127.0.0.1",
            &port.to_string(),
            "BBSR.00-BHZ",
            "2010/01/12",
            "14:00:00",
            "60",
            &out.display().to_string(),
            "100000000",
        ])
        .assert()
        .success();
    server.join().unwrap();

    let output = assert.get_output();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let log_lines: Vec<serde_json::Value> = stderr
        .lines()
        .filter(|line| line.starts_with('{'))
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    assert!(!log_lines.is_empty(), "no JSON log lines in: {stderr}");
    assert!(log_lines.iter().all(|line| line["level"].is_string()));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    assert!(stdout.starts_with("1 records collected"), "stdout: {stdout}");
}
