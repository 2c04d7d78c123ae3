//! Session observability metrics
//!
//! Metrics go through the `metrics` facade and cost nothing unless a recorder is installed.
//! [`init_metrics`] installs a Prometheus recorder with its own scrape endpoint.

use crate::downloader::TerminalState;
use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};
use metrics_exporter_prometheus::PrometheusBuilder;
use once_cell::sync::Lazy;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Global metrics registry initialization flag
static METRICS_INITIALIZED: Lazy<Arc<RwLock<bool>>> = Lazy::new(|| Arc::new(RwLock::new(false)));

static SESSION_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Install the Prometheus exporter on `addr`.
///
/// Idempotent: later calls are no-ops.
pub async fn init_metrics(addr: SocketAddr) -> Result<(), Box<dyn std::error::Error>> {
    let mut initialized = METRICS_INITIALIZED.write().await;
    if *initialized {
        debug!("Metrics already initialized, skipping");
        return Ok(());
    }

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| format!("Failed to install Prometheus exporter: {e}"))?;

    describe_counter!(
        "bytes_received_total",
        Unit::Bytes,
        "Raw bytes read from the data server"
    );
    describe_counter!(
        "frames_persisted_total",
        Unit::Count,
        "Data records appended to the sink"
    );
    describe_histogram!(
        "throttle_pause_seconds",
        Unit::Seconds,
        "Pauses applied by the rate limiter"
    );
    describe_counter!(
        "sessions_total",
        Unit::Count,
        "Finished sessions by terminal state"
    );
    describe_histogram!(
        "session_duration_seconds",
        Unit::Seconds,
        "Wall time from connect to terminal state"
    );

    *initialized = true;
    info!("Metrics system initialized on {}", addr);
    Ok(())
}

/// Check if the exporter has been installed
pub async fn is_initialized() -> bool {
    *METRICS_INITIALIZED.read().await
}

/// Short identifier used to correlate the log lines of one session
pub fn generate_session_id() -> String {
    let id = SESSION_COUNTER.fetch_add(1, Ordering::Relaxed) + 1;
    format!("sess-{id:08x}")
}

/// Record one raw read
pub fn record_bytes_read(bytes: usize) {
    counter!("bytes_received_total").increment(bytes as u64);
}

/// Record a pause applied by the rate limiter
pub fn record_throttle_pause(pause: Duration) {
    if !pause.is_zero() {
        histogram!("throttle_pause_seconds").record(pause.as_secs_f64());
    }
}

/// Record one data record appended to the sink
pub fn record_frame_persisted() {
    counter!("frames_persisted_total").increment(1);
}

/// Timer and labels for one session
pub struct SessionMetrics {
    channel: String,
    start_time: Instant,
}

impl SessionMetrics {
    /// Start tracking a session for `channel`
    pub fn start(channel: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            start_time: Instant::now(),
        }
    }

    /// Record the session's terminal state
    pub fn record_finished(&self, state: TerminalState, records: u64) {
        let duration = self.start_time.elapsed();

        counter!(
            "sessions_total",
            "channel" => self.channel.clone(),
            "state" => state.as_str(),
        )
        .increment(1);

        histogram!(
            "session_duration_seconds",
            "channel" => self.channel.clone(),
        )
        .record(duration.as_secs_f64());

        debug!(
            channel = %self.channel,
            state = state.as_str(),
            records,
            duration_ms = duration.as_millis(),
            "Session metrics recorded"
        );
    }
}
