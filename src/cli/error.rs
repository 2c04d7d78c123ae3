//! CLI error types and conversions

use crate::downloader::DownloadError;
use crate::output::SinkError;
use crate::request::RequestError;

/// CLI errors
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Request validation error
    #[error("invalid request: {0}")]
    RequestError(#[from] RequestError),

    /// Session error
    #[error("download error: {0}")]
    DownloadError(#[from] DownloadError),

    /// Output file error
    #[error("output error: {0}")]
    OutputError(#[from] SinkError),

    /// Configuration error
    #[error("configuration error: {0}")]
    ConfigurationError(String),
}
