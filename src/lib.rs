//! # Waveform Downloader Library
//!
//! A small, throttled client for the `DATREQ` waveform protocol spoken by seismic data
//! servers. A session opens one TCP connection, sends a single NUL-terminated request line
//! and then streams fixed 512-byte records to a local sink until the server sends its
//! terminator record or closes the connection.
//!
//! ## Features
//!
//! - **Partial-read reassembly**: records are rebuilt from reads of any size
//! - **Bandwidth cap**: a per-session rate limiter keeps throughput at or below a
//!   configured bits-per-second budget
//! - **Cooperative cancellation**: a cancel flag checked between records that also
//!   interrupts a read that is blocked waiting for the peer
//! - **Bounded waits**: connect and idle-read timeouts instead of unbounded blocking
//!
//! ## Quick Start
//!
//! ```no_run
//! use waveform_downloader::downloader::{spawn_session, SessionConfig};
//! use waveform_downloader::output::FileSink;
//! use waveform_downloader::DataRequest;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let request = DataRequest::new(
//!     "datasrv.example.org",
//!     16000,
//!     "BBSR.00-BHZ",
//!     "2010/01/12",
//!     "14:00:00",
//!     1200,
//!     6000,
//! )?;
//!
//! let sink = FileSink::open_append("BBSR.00-BHZ.mseed").await?;
//! let handle = spawn_session(request, SessionConfig::default(), sink);
//! let summary = handle.join().await?;
//! println!("{} records", summary.records);
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`request`] - Request parameters, validation and the wire line
//! - [`downloader`] - Connection setup, record reader, rate limiter and session worker
//! - [`output`] - Record sinks (append-mode file, in-memory)
//! - [`cancel`] - Cancellation controller shared between orchestrator and worker
//! - [`metrics`] - Session counters and optional Prometheus exporter
//! - [`cli`] - The `get` command

#![warn(missing_docs)]
#![warn(clippy::all)]

use std::fmt;

/// Cancellation flag shared between the orchestrator and the session worker
pub mod cancel;

/// Command-line surface
pub mod cli;

/// Session worker and its collaborators
pub mod downloader;

/// Session metrics
pub mod metrics;

/// Record sinks
pub mod output;

/// Request parameters and wire formatting
pub mod request;

pub use request::DataRequest;

/// Size in bytes of every record on the wire.
pub const FRAME_LEN: usize = 512;

/// Byte range inspected for the terminator tag.
pub const TERMINATOR_RANGE: std::ops::Range<usize> = 13..18;

/// Tag carried by the last record of a response.
pub const TERMINATOR_TAG: &[u8; 5] = b"RQLOG";

/// One fully assembled 512-byte record.
///
/// The payload is opaque apart from the terminator tag; no waveform decoding is done here.
#[derive(Clone, PartialEq, Eq)]
pub struct Frame {
    bytes: [u8; FRAME_LEN],
}

impl Frame {
    /// Wrap an assembled buffer.
    pub fn from_bytes(bytes: [u8; FRAME_LEN]) -> Self {
        Self { bytes }
    }

    /// Raw record bytes.
    pub fn as_bytes(&self) -> &[u8; FRAME_LEN] {
        &self.bytes
    }

    /// Whether this record carries the terminator tag.
    pub fn is_terminator(&self) -> bool {
        &self.bytes[TERMINATOR_RANGE] == TERMINATOR_TAG
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame")
            .field("tag", &String::from_utf8_lossy(&self.bytes[TERMINATOR_RANGE]))
            .field("len", &FRAME_LEN)
            .finish()
    }
}

/// Classification of an assembled record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameKind {
    /// A data record to be persisted
    Data(Frame),
    /// The end-of-response record; never persisted
    Terminator,
}

/// Classify an assembled record as data or terminator.
pub fn classify(frame: Frame) -> FrameKind {
    if frame.is_terminator() {
        FrameKind::Terminator
    } else {
        FrameKind::Data(frame)
    }
}
