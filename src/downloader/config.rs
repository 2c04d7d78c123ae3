//! Session configuration constants and knobs

use serde::Serialize;
use std::time::Duration;

/// Bandwidth cap applied when the request asks for zero or a negative rate.
pub const DEFAULT_THROTTLE_BPS: u64 = 6000;

/// Receive buffer requested on the socket.
/// Kept small so the server's records arrive over several short reads.
pub const DEFAULT_RECV_BUFFER_BYTES: u32 = 1024;

/// Upper bound on establishing the TCP connection.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Upper bound on any single read while streaming.
/// A server that neither sends a record nor closes within this window fails the session.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(60);

/// How to classify a stream that ends before the terminator record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EndOfStreamPolicy {
    /// Treat an early close as a normal completion
    #[default]
    Lenient,
    /// Treat an early close as a truncated, failed transfer
    Strict,
}

/// Per-session tuning. Defaults match the protocol's usual deployment.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Socket receive buffer size in bytes
    pub recv_buffer_bytes: u32,
    /// Connect timeout
    pub connect_timeout: Duration,
    /// Idle read timeout; `None` waits forever
    pub idle_timeout: Option<Duration>,
    /// Early end-of-stream classification
    pub eof_policy: EndOfStreamPolicy,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            recv_buffer_bytes: DEFAULT_RECV_BUFFER_BYTES,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            idle_timeout: Some(DEFAULT_IDLE_TIMEOUT),
            eof_policy: EndOfStreamPolicy::default(),
        }
    }
}

impl SessionConfig {
    /// Set the socket receive buffer size
    pub fn with_recv_buffer(mut self, bytes: u32) -> Self {
        self.recv_buffer_bytes = bytes;
        self
    }

    /// Set the connect timeout
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set or disable the idle read timeout
    pub fn with_idle_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.idle_timeout = timeout;
        self
    }

    /// Choose how an early end of stream is classified
    pub fn with_eof_policy(mut self, policy: EndOfStreamPolicy) -> Self {
        self.eof_policy = policy;
        self
    }
}
