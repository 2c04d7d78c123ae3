//! Append-mode file sink

use super::{FrameSink, SinkError, SinkResult};
use crate::{Frame, FRAME_LEN};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::debug;

/// Writes records to the end of a file, creating it if missing.
///
/// Nothing besides the records themselves is written: no header, no trailer. Every append is
/// flushed to the file before it returns, so a failing disk fails the append itself.
pub struct FileSink {
    path: PathBuf,
    file: Option<File>,
    bytes_written: u64,
}

impl FileSink {
    /// Open `path` for appending.
    pub async fn open_append(path: impl AsRef<Path>) -> SinkResult<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|e| SinkError::OpenError {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;

        debug!(path = %path.display(), "Opened output file for append");

        Ok(Self {
            path,
            file: Some(file),
            bytes_written: 0,
        })
    }
}

#[async_trait]
impl FrameSink for FileSink {
    async fn append(&mut self, frame: &Frame) -> SinkResult<()> {
        let file = self
            .file
            .as_mut()
            .ok_or_else(|| SinkError::WriteError("sink already closed".to_string()))?;
        // tokio's File reports a failed write on the next operation; flush surfaces it here.
        file.write_all(frame.as_bytes())
            .await
            .map_err(|e| SinkError::WriteError(e.to_string()))?;
        file.flush()
            .await
            .map_err(|e| SinkError::WriteError(e.to_string()))?;
        self.bytes_written += FRAME_LEN as u64;
        Ok(())
    }

    async fn close(&mut self) -> SinkResult<()> {
        let Some(file) = self.file.take() else {
            return Ok(());
        };
        file.sync_all()
            .await
            .map_err(|e| SinkError::CloseError(e.to_string()))?;

        debug!(
            path = %self.path.display(),
            bytes = self.bytes_written,
            "Closed output file"
        );
        Ok(())
    }

    fn bytes_written(&self) -> u64 {
        self.bytes_written
    }
}
