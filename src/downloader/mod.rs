//! Session worker and its collaborators
//!
//! One session is one TCP connection, one request line and one stream of records:
//!
//! 1. **Connect**: [`connection::Connection::open`] resolves the host and opens a socket with a
//!    small receive buffer and zero linger
//! 2. **Request**: [`connection::Connection::send_request`] writes the `DATREQ` line
//! 3. **Stream**: [`reader::RecordReader`] reassembles 512-byte records, throttled by
//!    [`rate_limit::RateLimiter`], until the terminator record or end of stream
//! 4. **Persist**: data records go to a [`FrameSink`](crate::output::FrameSink), which is
//!    closed when the session ends
//!
//! [`session::spawn_session`] runs all of this on a dedicated task and hands back a
//! [`session::SessionHandle`] for polling, cancelling and joining.
//!
//! # Error Handling
//!
//! Every failure ends the session; nothing is retried here:
//! - Resolution and connection errors happen before any record is read
//! - Read, write and idle-timeout errors end a session part way through
//! - A read error after cancellation was requested is reported as cancelled, not failed

pub mod config;
pub mod connection;
pub mod progress;
pub mod rate_limit;
pub mod reader;
pub mod session;

pub use config::{EndOfStreamPolicy, SessionConfig};
pub use connection::Connection;
pub use progress::{SessionPhase, SessionProgress};
pub use rate_limit::RateLimiter;
pub use reader::{ReadEvent, RecordReader};
pub use session::{
    run_session, spawn_session, spawn_session_with_cancel, SessionHandle, SessionSummary,
    TerminalState,
};

use crate::output::SinkError;
use std::time::Duration;

/// Download errors
#[derive(Debug, thiserror::Error)]
pub enum DownloadError {
    /// Host name did not resolve to any address
    #[error("cannot resolve {host}:{port}: {reason}")]
    ResolutionError {
        /// Requested host
        host: String,
        /// Requested port
        port: u16,
        /// Resolver failure
        reason: String,
    },

    /// TCP connect failed, timed out, or the request could not be sent
    #[error("connection to {target} failed: {reason}")]
    ConnectionError {
        /// Address or host:port attempted
        target: String,
        /// Underlying failure
        reason: String,
    },

    /// I/O failure while streaming records
    #[error("read error: {0}")]
    ReadError(#[source] std::io::Error),

    /// Sink failure
    #[error("write error: {0}")]
    WriteError(#[from] SinkError),

    /// No bytes arrived within the idle timeout
    #[error("no data received for {0:?}")]
    IdleTimeout(Duration),

    /// Stream ended before the terminator record (strict end-of-stream policy)
    #[error("stream ended after {records} records without terminator ({partial_bytes} trailing bytes)")]
    Truncated {
        /// Records persisted before the close
        records: u64,
        /// Bytes of the incomplete record discarded
        partial_bytes: usize,
    },

    /// The worker task panicked or was aborted
    #[error("session worker failed: {0}")]
    WorkerError(String),
}

impl DownloadError {
    /// Whether the failure happened before any data could flow.
    pub fn is_connect_phase(&self) -> bool {
        matches!(
            self,
            DownloadError::ResolutionError { .. } | DownloadError::ConnectionError { .. }
        )
    }
}
