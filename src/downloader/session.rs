//! The session worker
//!
//! [`run_session`] drives one session from connect to terminal state. [`spawn_session`] runs
//! it on its own task and returns a [`SessionHandle`] through which the orchestrator polls
//! counters, requests cancellation and collects the [`SessionSummary`].

use super::config::{EndOfStreamPolicy, SessionConfig};
use super::connection::Connection;
use super::progress::{SessionPhase, SessionProgress, SharedProgress};
use super::rate_limit::RateLimiter;
use super::reader::{ReadEvent, RecordReader};
use super::DownloadError;
use crate::cancel::{CancellationController, SharedCancel};
use crate::metrics::{self, SessionMetrics};
use crate::output::FrameSink;
use crate::request::DataRequest;
use serde::{Serialize, Serializer};
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn, Instrument};

/// How a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TerminalState {
    /// Terminator record seen, or the peer closed under the lenient policy
    Completed,
    /// Stopped on request
    Cancelled,
    /// Stopped by an error
    Failed,
}

impl TerminalState {
    /// Lowercase label
    pub fn as_str(&self) -> &'static str {
        match self {
            TerminalState::Completed => "completed",
            TerminalState::Cancelled => "cancelled",
            TerminalState::Failed => "failed",
        }
    }
}

/// Final counters of a session, read once by the orchestrator.
#[derive(Debug, Serialize)]
pub struct SessionSummary {
    /// The request that was served
    pub request: DataRequest,
    /// Terminal state
    pub state: TerminalState,
    /// Data records appended to the sink
    pub records: u64,
    /// Bytes appended to the sink; always `512 * records`
    pub bytes_written: u64,
    /// Raw bytes read from the socket
    pub bytes_read: u64,
    /// Whether the terminator record was received
    pub terminator_seen: bool,
    /// Wall time of the session
    #[serde(serialize_with = "serialize_secs")]
    pub elapsed: Duration,
    /// Why the session failed, when it did
    #[serde(rename = "error", serialize_with = "serialize_error")]
    pub failure: Option<DownloadError>,
}

impl SessionSummary {
    /// Whether the session ended in [`TerminalState::Completed`]
    pub fn is_completed(&self) -> bool {
        self.state == TerminalState::Completed
    }
}

fn serialize_secs<S: Serializer>(elapsed: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(elapsed.as_secs_f64())
}

fn serialize_error<S: Serializer>(
    error: &Option<DownloadError>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match error {
        Some(e) => serializer.serialize_some(&e.to_string()),
        None => serializer.serialize_none(),
    }
}

/// How the streaming loop stopped without error.
enum StreamEnd {
    Terminator,
    PeerClosed,
    Cancelled,
}

/// Run one session to completion on the current task.
///
/// The sink is closed exactly once whatever the outcome; a close failure is logged and
/// leaves the terminal state untouched.
pub async fn run_session<S: FrameSink>(
    request: DataRequest,
    config: SessionConfig,
    mut sink: S,
    cancel: SharedCancel,
    progress: SharedProgress,
) -> SessionSummary {
    let started = Instant::now();
    let session_metrics = SessionMetrics::start(request.channel());

    info!(
        host = request.host(),
        port = request.port(),
        channel = request.channel(),
        date = request.date(),
        time = request.time(),
        duration_secs = request.duration_secs(),
        throttle_bps = request.throttle_bps(),
        "Session started"
    );

    let result = stream_records(&request, &config, &mut sink, &cancel, &progress).await;

    if let Err(e) = sink.close().await {
        warn!(error = %e, "Failed to close output; keeping session outcome");
    }
    progress.set_phase(SessionPhase::Finished);

    let (state, terminator_seen, failure) = match result {
        Ok(StreamEnd::Terminator) => (TerminalState::Completed, true, None),
        Ok(StreamEnd::PeerClosed) => (TerminalState::Completed, false, None),
        Ok(StreamEnd::Cancelled) => (TerminalState::Cancelled, false, None),
        Err(e) => (TerminalState::Failed, false, Some(e)),
    };

    let records = progress.records();
    session_metrics.record_finished(state, records);

    let summary = SessionSummary {
        request,
        state,
        records,
        bytes_written: sink.bytes_written(),
        bytes_read: progress.bytes_read(),
        terminator_seen,
        elapsed: started.elapsed(),
        failure,
    };

    match &summary.failure {
        Some(e) => warn!(records, error = %e, "Session failed"),
        None => info!(
            records,
            state = state.as_str(),
            terminator_seen,
            elapsed_ms = summary.elapsed.as_millis(),
            "Session finished"
        ),
    }

    summary
}

async fn stream_records<S: FrameSink>(
    request: &DataRequest,
    config: &SessionConfig,
    sink: &mut S,
    cancel: &SharedCancel,
    progress: &SharedProgress,
) -> Result<StreamEnd, DownloadError> {
    progress.set_phase(SessionPhase::Connecting);
    let mut connection = tokio::select! {
        biased;
        _ = cancel.cancelled() => return Ok(StreamEnd::Cancelled),
        result = Connection::open(request.host(), request.port(), config) => result?,
    };

    progress.set_phase(SessionPhase::Requesting);
    connection.send_request(request).await?;

    progress.set_phase(SessionPhase::Streaming);
    let peer = connection.peer_addr();
    let mut reader = RecordReader::new(
        connection.into_stream(),
        RateLimiter::new(request.throttle_bps() as i64),
        cancel.clone(),
    )
    .with_idle_timeout(config.idle_timeout)
    .with_progress(progress.clone());

    // The reader owns the socket; returning from here drops and closes it.
    loop {
        match reader.next_frame().await? {
            ReadEvent::Data(frame) => {
                sink.append(&frame).await?;
                progress.record_persisted();
                metrics::record_frame_persisted();
                debug!(records = progress.records(), "Record persisted");
            }
            ReadEvent::Terminator => {
                debug!(%peer, "Terminator record received");
                return Ok(StreamEnd::Terminator);
            }
            ReadEvent::EndOfStream { partial_bytes } => {
                let records = progress.records();
                if partial_bytes > 0 {
                    warn!(partial_bytes, "Discarding incomplete trailing record");
                }
                return match config.eof_policy {
                    EndOfStreamPolicy::Lenient => {
                        debug!(%peer, records, "Peer closed before terminator record");
                        Ok(StreamEnd::PeerClosed)
                    }
                    EndOfStreamPolicy::Strict => Err(DownloadError::Truncated {
                        records,
                        partial_bytes,
                    }),
                };
            }
            ReadEvent::Cancelled => {
                info!(%peer, records = progress.records(), "Session cancelled; closing connection");
                return Ok(StreamEnd::Cancelled);
            }
        }
    }
}

/// Orchestrator's handle on a running session.
pub struct SessionHandle {
    cancel: SharedCancel,
    progress: SharedProgress,
    worker: JoinHandle<SessionSummary>,
}

impl SessionHandle {
    /// Request cooperative cancellation.
    pub fn request_cancel(&self) {
        self.cancel.request_cancel();
    }

    /// Live counters
    pub fn progress(&self) -> &SessionProgress {
        &self.progress
    }

    /// Whether the worker has reached a terminal state
    pub fn is_finished(&self) -> bool {
        self.worker.is_finished()
    }

    /// Wait for the worker and take its summary.
    pub async fn join(self) -> Result<SessionSummary, DownloadError> {
        self.worker
            .await
            .map_err(|e| DownloadError::WorkerError(e.to_string()))
    }
}

/// Start a session on a dedicated task with its own cancellation controller.
pub fn spawn_session<S>(request: DataRequest, config: SessionConfig, sink: S) -> SessionHandle
where
    S: FrameSink + 'static,
{
    spawn_session_with_cancel(request, config, sink, CancellationController::shared())
}

/// Start a session on a dedicated task observing an existing controller.
pub fn spawn_session_with_cancel<S>(
    request: DataRequest,
    config: SessionConfig,
    sink: S,
    cancel: SharedCancel,
) -> SessionHandle
where
    S: FrameSink + 'static,
{
    let progress = SessionProgress::shared();
    let span = tracing::info_span!(
        "session",
        id = %metrics::generate_session_id(),
        channel = request.channel()
    );
    let worker = tokio::spawn(
        run_session(request, config, sink, cancel.clone(), progress.clone()).instrument(span),
    );

    SessionHandle {
        cancel,
        progress,
        worker,
    }
}
