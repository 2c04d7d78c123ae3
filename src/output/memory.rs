//! In-memory sink for embedding and tests

use super::{FrameSink, SinkError, SinkResult};
use crate::{Frame, FRAME_LEN};
use async_trait::async_trait;
use std::sync::{Arc, Mutex};

/// Collects records into a shared buffer.
///
/// Clones share the same buffer, so a clone kept by the caller can read what a session
/// wrote after the sink itself was moved into the worker.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    buffer: Arc<Mutex<Vec<u8>>>,
    closed: Arc<Mutex<bool>>,
    bytes_written: u64,
}

impl MemorySink {
    /// Create an empty sink
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of everything appended so far
    pub fn contents(&self) -> Vec<u8> {
        self.buffer.lock().map(|b| b.clone()).unwrap_or_default()
    }

    /// Whether `close` has been called on any clone
    pub fn is_closed(&self) -> bool {
        self.closed.lock().map(|c| *c).unwrap_or(false)
    }
}

#[async_trait]
impl FrameSink for MemorySink {
    async fn append(&mut self, frame: &Frame) -> SinkResult<()> {
        let mut buffer = self
            .buffer
            .lock()
            .map_err(|e| SinkError::WriteError(e.to_string()))?;
        buffer.extend_from_slice(frame.as_bytes());
        self.bytes_written += FRAME_LEN as u64;
        Ok(())
    }

    async fn close(&mut self) -> SinkResult<()> {
        let mut closed = self
            .closed
            .lock()
            .map_err(|e| SinkError::CloseError(e.to_string()))?;
        *closed = true;
        Ok(())
    }

    fn bytes_written(&self) -> u64 {
        self.bytes_written
    }
}
