//! Record sinks
//!
//! A sink receives every accepted data record of a session, in order, and is closed exactly
//! once when the session ends.

use crate::Frame;
use async_trait::async_trait;

pub mod file;
pub mod memory;

pub use file::FileSink;
pub use memory::MemorySink;

/// Sink errors
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    /// The target could not be opened
    #[error("cannot open {path}: {reason}")]
    OpenError {
        /// Target path
        path: String,
        /// Underlying failure
        reason: String,
    },

    /// A record could not be written
    #[error("write failed: {0}")]
    WriteError(String),

    /// Buffered data could not be flushed or the target could not be closed
    #[error("close failed: {0}")]
    CloseError(String),
}

/// Result type for sink operations
pub type SinkResult<T> = Result<T, SinkError>;

/// Destination for accepted data records
#[async_trait]
pub trait FrameSink: Send {
    /// Persist one record: exactly [`FRAME_LEN`](crate::FRAME_LEN) bytes, verbatim.
    async fn append(&mut self, frame: &Frame) -> SinkResult<()>;

    /// Flush and release the target. Called once at session end.
    async fn close(&mut self) -> SinkResult<()>;

    /// Bytes appended by this sink so far
    fn bytes_written(&self) -> u64;
}
