//! Bandwidth throttling keyed to raw read sizes
//!
//! Every read of `n` bytes must take at least `n * 8000 / rate` milliseconds, measured from
//! the end of the previous check. The limiter pauses for whatever part of that budget has
//! not already elapsed.

use crate::request::effective_throttle;
use std::time::Duration;
use tokio::time::{sleep, Instant};

/// Per-session rate limiter
#[derive(Debug, Clone)]
pub struct RateLimiter {
    rate_bps: u64,
    last_check: Instant,
}

impl RateLimiter {
    /// Create a limiter for `rate_bps` bits per second.
    ///
    /// Zero or negative rates fall back to
    /// [`DEFAULT_THROTTLE_BPS`](crate::downloader::config::DEFAULT_THROTTLE_BPS).
    pub fn new(rate_bps: i64) -> Self {
        Self {
            rate_bps: effective_throttle(rate_bps),
            last_check: Instant::now(),
        }
    }

    /// Effective rate in bits per second
    pub fn rate_bps(&self) -> u64 {
        self.rate_bps
    }

    /// Pause still owed for `bytes` after `elapsed` has already passed.
    pub fn required_pause(&self, bytes: usize, elapsed: Duration) -> Duration {
        let budget_ms = (bytes as u64).saturating_mul(8000) / self.rate_bps;
        Duration::from_millis(budget_ms).saturating_sub(elapsed)
    }

    /// Account for a read of `bytes`, sleeping if the read came in too fast.
    ///
    /// Returns the pause that was applied. The check timestamp is reset afterwards whether
    /// or not a pause happened.
    pub async fn on_bytes_read(&mut self, bytes: usize) -> Duration {
        let pause = self.required_pause(bytes, self.last_check.elapsed());
        if !pause.is_zero() {
            sleep(pause).await;
        }
        self.last_check = Instant::now();
        pause
    }
}
