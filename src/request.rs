//! Request parameters and the `DATREQ` wire line
//!
//! A [`DataRequest`] is validated once at construction and is immutable afterwards; the
//! session worker only ever reads it.

use crate::downloader::config::DEFAULT_THROTTLE_BPS;
use chrono::{NaiveDate, NaiveTime};
use serde::Serialize;
use std::fmt;

/// Keyword that opens every request line.
pub const REQUEST_KEYWORD: &str = "DATREQ";

/// Date layout accepted on the command line and sent on the wire.
pub const DATE_FORMAT: &str = "%Y/%m/%d";

/// Time layout accepted on the command line and sent on the wire.
pub const TIME_FORMAT: &str = "%H:%M:%S";

/// Request validation errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RequestError {
    /// Host is empty
    #[error("host cannot be empty")]
    EmptyHost,

    /// Port 0 cannot be connected to
    #[error("invalid port: {0}")]
    InvalidPort(u16),

    /// Channel identifier is empty or not a single wire token
    #[error("invalid channel identifier {0:?}: must be a non-empty token without whitespace")]
    InvalidChannel(String),

    /// Date is not `yyyy/mm/dd`
    #[error("invalid start date {0:?}: expected yyyy/mm/dd")]
    InvalidDate(String),

    /// Time is not `hh:mm:ss`
    #[error("invalid start time {0:?}: expected hh:mm:ss")]
    InvalidTime(String),

    /// Zero-length window
    #[error("duration must be at least one second")]
    InvalidDuration,
}

/// One waveform request against one server.
///
/// # Examples
///
/// ```
/// use waveform_downloader::DataRequest;
///
/// let request = DataRequest::new("localhost", 16000, "BBSR.00-BHZ", "2010/01/12", "14:00:00", 1200, 0).unwrap();
/// assert_eq!(request.throttle_bps(), 6000);
/// assert_eq!(request.wire_line(), b"DATREQ BBSR.00-BHZ 2010/01/12 14:00:00 1200\0".to_vec());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DataRequest {
    host: String,
    port: u16,
    channel: String,
    date: String,
    time: String,
    duration_secs: u32,
    throttle_bps: u64,
}

impl DataRequest {
    /// Build and validate a request.
    ///
    /// A `throttle_bps` of zero or less selects [`DEFAULT_THROTTLE_BPS`].
    ///
    /// # Errors
    ///
    /// Returns a [`RequestError`] naming the first invalid field.
    pub fn new(
        host: impl Into<String>,
        port: u16,
        channel: impl Into<String>,
        date: impl Into<String>,
        time: impl Into<String>,
        duration_secs: u32,
        throttle_bps: i64,
    ) -> Result<Self, RequestError> {
        let host = host.into().trim().to_string();
        if host.is_empty() {
            return Err(RequestError::EmptyHost);
        }
        if port == 0 {
            return Err(RequestError::InvalidPort(port));
        }

        let channel = channel.into();
        if channel.is_empty() || channel.chars().any(|c| c.is_whitespace() || c == '\0') {
            return Err(RequestError::InvalidChannel(channel));
        }

        // Validate the layout but keep the caller's text for the wire.
        let date = date.into();
        NaiveDate::parse_from_str(&date, DATE_FORMAT)
            .map_err(|_| RequestError::InvalidDate(date.clone()))?;

        let time = time.into();
        NaiveTime::parse_from_str(&time, TIME_FORMAT)
            .map_err(|_| RequestError::InvalidTime(time.clone()))?;

        if duration_secs == 0 {
            return Err(RequestError::InvalidDuration);
        }

        Ok(Self {
            host,
            port,
            channel,
            date,
            time,
            duration_secs,
            throttle_bps: effective_throttle(throttle_bps),
        })
    }

    /// Server host name or address
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Server port
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Channel identifier, e.g. `BBSR.00-BHZ`
    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Start date as given (`yyyy/mm/dd`)
    pub fn date(&self) -> &str {
        &self.date
    }

    /// Start time as given (`hh:mm:ss`)
    pub fn time(&self) -> &str {
        &self.time
    }

    /// Window length in seconds
    pub fn duration_secs(&self) -> u32 {
        self.duration_secs
    }

    /// Effective bandwidth cap in bits per second (never zero)
    pub fn throttle_bps(&self) -> u64 {
        self.throttle_bps
    }

    /// Exact bytes written to the server: the request line followed by a single NUL.
    pub fn wire_line(&self) -> Vec<u8> {
        let mut line = self.to_string().into_bytes();
        line.push(0);
        line
    }
}

impl fmt::Display for DataRequest {
    /// The request line without its NUL terminator.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{REQUEST_KEYWORD} {} {} {} {}",
            self.channel, self.date, self.time, self.duration_secs
        )
    }
}

/// Coerce a configured rate to a usable one.
pub fn effective_throttle(throttle_bps: i64) -> u64 {
    if throttle_bps <= 0 {
        DEFAULT_THROTTLE_BPS
    } else {
        throttle_bps as u64
    }
}
