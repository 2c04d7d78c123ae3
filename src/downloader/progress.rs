//! Live session counters shared with the orchestrator.
//!
//! The worker is the only writer. The orchestrator reads a [`ProgressSnapshot`] whenever it
//! wants to refresh its display; no lock is involved on either side.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Shared handle to session counters.
pub type SharedProgress = Arc<SessionProgress>;

/// Where a session is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionPhase {
    /// Created, not started
    Idle,
    /// Resolving and connecting
    Connecting,
    /// Writing the request line
    Requesting,
    /// Reading records
    Streaming,
    /// Ended in a terminal state
    Finished,
}

impl SessionPhase {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Connecting,
            2 => Self::Requesting,
            3 => Self::Streaming,
            4 => Self::Finished,
            _ => Self::Idle,
        }
    }

    /// Lowercase label
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::Requesting => "requesting",
            Self::Streaming => "streaming",
            Self::Finished => "finished",
        }
    }
}

/// Counters updated by the session worker.
#[derive(Debug)]
pub struct SessionProgress {
    phase: AtomicU8,
    records: AtomicU64,
    bytes_read: AtomicU64,
    start_time: Instant,
}

impl Default for SessionProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionProgress {
    /// Fresh counters in the idle phase.
    pub fn new() -> Self {
        Self {
            phase: AtomicU8::new(SessionPhase::Idle as u8),
            records: AtomicU64::new(0),
            bytes_read: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    /// Create new counters wrapped in [`Arc`].
    pub fn shared() -> SharedProgress {
        Arc::new(Self::new())
    }

    /// Move to `phase`.
    pub fn set_phase(&self, phase: SessionPhase) {
        self.phase.store(phase as u8, Ordering::Release);
    }

    /// Current phase
    pub fn phase(&self) -> SessionPhase {
        SessionPhase::from_u8(self.phase.load(Ordering::Acquire))
    }

    /// Count one persisted record.
    pub fn record_persisted(&self) {
        self.records.fetch_add(1, Ordering::AcqRel);
    }

    /// Count raw bytes read from the socket.
    pub fn add_bytes_read(&self, bytes: usize) {
        self.bytes_read.fetch_add(bytes as u64, Ordering::AcqRel);
    }

    /// Records persisted so far
    pub fn records(&self) -> u64 {
        self.records.load(Ordering::Acquire)
    }

    /// Raw bytes read so far, including any terminator and partial record
    pub fn bytes_read(&self) -> u64 {
        self.bytes_read.load(Ordering::Acquire)
    }

    /// Point-in-time copy of all counters.
    pub fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            phase: self.phase(),
            records: self.records(),
            bytes_read: self.bytes_read(),
            elapsed: self.start_time.elapsed(),
        }
    }
}

/// Copy of the counters at one instant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressSnapshot {
    /// Lifecycle phase
    pub phase: SessionPhase,
    /// Records persisted
    pub records: u64,
    /// Raw bytes read
    pub bytes_read: u64,
    /// Time since the counters were created
    pub elapsed: Duration,
}

impl ProgressSnapshot {
    /// Observed throughput in bits per second.
    pub fn rate_bps(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.bytes_read as f64 * 8.0 / secs
        } else {
            0.0
        }
    }

    /// Human-readable progress line.
    pub fn format_progress(&self) -> String {
        let mut parts = vec![format!(
            "{} {} records ({} bytes)",
            self.phase.as_str(),
            self.records,
            self.bytes_read
        )];

        let rate = self.rate_bps();
        if rate > 0.0 {
            parts.push(format!("at {rate:.0} bit/s"));
        }

        parts.push(format!("- {} elapsed", format_duration(self.elapsed)));
        parts.join(" ")
    }
}

/// Compact duration label ("42s", "3m", "1.5h").
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs < 60 {
        format!("{secs}s")
    } else if secs < 3600 {
        format!("{}m", secs / 60)
    } else {
        format!("{:.1}h", secs as f64 / 3600.0)
    }
}
