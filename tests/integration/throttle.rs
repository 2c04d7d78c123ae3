//! Bandwidth cap enforcement

use super::support::{MockBehavior, MockServer};
use std::time::{Duration, Instant};
use waveform_downloader::downloader::{spawn_session, RateLimiter, SessionConfig, TerminalState};
use waveform_downloader::output::MemorySink;
use waveform_downloader::DataRequest;

#[tokio::test(start_paused = true)]
async fn test_successive_records_respect_default_rate() {
    let mut limiter = RateLimiter::new(0);
    assert_eq!(limiter.rate_bps(), 6000);

    let budget = Duration::from_millis(512 * 8000 / 6000);
    let mut completions = Vec::new();
    for _ in 0..4 {
        limiter.on_bytes_read(512).await;
        completions.push(tokio::time::Instant::now());
    }

    for pair in completions.windows(2) {
        assert!(pair[1] - pair[0] >= budget, "gap {:?}", pair[1] - pair[0]);
    }
}

#[tokio::test(start_paused = true)]
async fn test_partial_reads_are_throttled_individually() {
    let mut limiter = RateLimiter::new(8000);
    let start = tokio::time::Instant::now();
    // 512 bytes in four reads still costs 512 ms at 8000 bit/s
    for _ in 0..4 {
        limiter.on_bytes_read(128).await;
    }
    assert!(start.elapsed() >= Duration::from_millis(512));
}

#[tokio::test]
async fn test_session_throughput_is_capped() {
    let server = MockServer::start(MockBehavior::complete(3)).await;
    let request = DataRequest::new(
        "127.0.0.1",
        server.port,
        "BBSR.00-BHZ",
        "2010/01/12",
        "14:00:00",
        1200,
        16_000,
    )
    .unwrap();

    let started = Instant::now();
    let summary = spawn_session(request, SessionConfig::default(), MemorySink::new())
        .join()
        .await
        .unwrap();
    let elapsed = started.elapsed();

    assert_eq!(summary.state, TerminalState::Completed);
    assert_eq!(summary.records, 3);
    // 2048 bytes at 16 kbit/s is 1024 ms; allow slack for the first read
    assert!(
        elapsed >= Duration::from_millis(900),
        "finished too fast: {elapsed:?}"
    );
    server.finish().await;
}
