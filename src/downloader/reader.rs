//! Record reassembly from a byte stream
//!
//! Reads may return any number of bytes; the reader keeps filling one 512-byte buffer until it
//! is complete, throttling after every individual read.

use super::progress::SessionProgress;
use super::rate_limit::RateLimiter;
use super::DownloadError;
use crate::cancel::SharedCancel;
use crate::{classify, metrics, Frame, FrameKind, FRAME_LEN};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::time::timeout;
use tracing::trace;

/// Result of one [`RecordReader::next_frame`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadEvent {
    /// A complete data record
    Data(Frame),
    /// The terminator record was read and discarded
    Terminator,
    /// The peer closed the stream; `partial_bytes` of an incomplete record were dropped
    EndOfStream {
        /// Bytes of the incomplete record
        partial_bytes: usize,
    },
    /// Cancellation was requested
    Cancelled,
}

impl From<FrameKind> for ReadEvent {
    fn from(kind: FrameKind) -> Self {
        match kind {
            FrameKind::Data(frame) => ReadEvent::Data(frame),
            FrameKind::Terminator => ReadEvent::Terminator,
        }
    }
}

/// Reassembles records from `R`.
pub struct RecordReader<R> {
    inner: R,
    limiter: RateLimiter,
    cancel: SharedCancel,
    idle_timeout: Option<Duration>,
    progress: Option<Arc<SessionProgress>>,
    buffer: [u8; FRAME_LEN],
}

impl<R: AsyncRead + Unpin> RecordReader<R> {
    /// Wrap `inner`, throttled by `limiter` and stopped by `cancel`.
    pub fn new(inner: R, limiter: RateLimiter, cancel: SharedCancel) -> Self {
        Self {
            inner,
            limiter,
            cancel,
            idle_timeout: None,
            progress: None,
            buffer: [0u8; FRAME_LEN],
        }
    }

    /// Fail a read that waits longer than `idle_timeout`.
    pub fn with_idle_timeout(mut self, idle_timeout: Option<Duration>) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }

    /// Report raw byte counts to `progress`.
    pub fn with_progress(mut self, progress: Arc<SessionProgress>) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Read the next record.
    ///
    /// The cancel flag is checked before the record is started, and a pending read is
    /// abandoned as soon as cancellation is requested. A read error observed once the flag
    /// is set is reported as [`ReadEvent::Cancelled`].
    pub async fn next_frame(&mut self) -> Result<ReadEvent, DownloadError> {
        if self.cancel.is_cancel_requested() {
            return Ok(ReadEvent::Cancelled);
        }

        let cancel = Arc::clone(&self.cancel);
        let mut filled = 0;
        while filled < FRAME_LEN {
            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Ok(ReadEvent::Cancelled),
                result = read_bounded(&mut self.inner, &mut self.buffer[filled..], self.idle_timeout) => result,
            };

            let n = match result {
                Ok(0) => {
                    return Ok(ReadEvent::EndOfStream {
                        partial_bytes: filled,
                    })
                }
                Ok(n) => n,
                Err(_) if cancel.is_cancel_requested() => return Ok(ReadEvent::Cancelled),
                Err(e) => return Err(e),
            };

            filled += n;
            if let Some(progress) = &self.progress {
                progress.add_bytes_read(n);
            }
            metrics::record_bytes_read(n);

            let pause = self.limiter.on_bytes_read(n).await;
            metrics::record_throttle_pause(pause);
            trace!(bytes = n, filled, pause_ms = pause.as_millis(), "Read chunk");
        }

        Ok(classify(Frame::from_bytes(self.buffer)).into())
    }
}

async fn read_bounded<R: AsyncRead + Unpin>(
    inner: &mut R,
    buf: &mut [u8],
    idle_timeout: Option<Duration>,
) -> Result<usize, DownloadError> {
    let read = inner.read(buf);
    match idle_timeout {
        Some(limit) => timeout(limit, read)
            .await
            .map_err(|_| DownloadError::IdleTimeout(limit))?
            .map_err(DownloadError::ReadError),
        None => read.await.map_err(DownloadError::ReadError),
    }
}
