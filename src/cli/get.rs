//! The `get` command: fetch one channel's records into a file

use crate::cancel::SharedCancel;
use crate::downloader::config::{
    EndOfStreamPolicy, SessionConfig, DEFAULT_CONNECT_TIMEOUT, DEFAULT_IDLE_TIMEOUT,
    DEFAULT_RECV_BUFFER_BYTES,
};
use crate::downloader::session::{spawn_session_with_cancel, SessionSummary, TerminalState};
use crate::output::FileSink;
use crate::request::DataRequest;
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::CliError;

/// How often the orchestrator polls the session counters.
const POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Waveform downloader CLI
#[derive(Parser, Debug)]
#[command(name = "waveform-downloader")]
#[command(about = "Fetch seismic waveform records from a DATREQ data server", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Output format (json or human)
    #[arg(long, global = true, default_value = "human")]
    pub output_format: OutputFormat,

    /// Seconds to wait for data before failing the session (0 waits forever)
    #[arg(long, global = true, default_value_t = DEFAULT_IDLE_TIMEOUT.as_secs())]
    pub idle_timeout: u64,

    /// Seconds to wait for the TCP connection
    #[arg(long, global = true, default_value_t = DEFAULT_CONNECT_TIMEOUT.as_secs(), value_parser = clap::value_parser!(u64).range(1..))]
    pub connect_timeout: u64,

    /// Socket receive buffer size in bytes
    #[arg(long, global = true, default_value_t = DEFAULT_RECV_BUFFER_BYTES)]
    pub recv_buffer: u32,

    /// Fail the session if the server closes before sending its terminator record
    #[arg(long, global = true, default_value_t = false)]
    pub strict_eof: bool,

    /// Serve Prometheus metrics on this address (e.g. 127.0.0.1:9090)
    #[arg(long, global = true)]
    pub metrics_addr: Option<SocketAddr>,

    /// Disable the live progress spinner
    #[arg(long, global = true, default_value_t = false)]
    pub no_progress: bool,
}

impl Cli {
    /// Session tuning derived from the global flags
    pub fn session_config(&self) -> SessionConfig {
        let idle_timeout = match self.idle_timeout {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        };
        let eof_policy = if self.strict_eof {
            EndOfStreamPolicy::Strict
        } else {
            EndOfStreamPolicy::Lenient
        };

        SessionConfig::default()
            .with_recv_buffer(self.recv_buffer)
            .with_connect_timeout(Duration::from_secs(self.connect_timeout))
            .with_idle_timeout(idle_timeout)
            .with_eof_policy(eof_policy)
    }
}

/// CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Fetch one channel's records and append them to a file
    Get(GetArgs),
}

/// Arguments for `get`
#[derive(Parser, Debug)]
pub struct GetArgs {
    /// Data server host
    pub host: String,

    /// Data server port
    pub port: u16,

    /// Channel identifier (e.g. BBSR.00-BHZ)
    pub id: String,

    /// Start date (yyyy/mm/dd)
    pub date: String,

    /// Start time (hh:mm:ss)
    pub time: String,

    /// Window length in seconds
    pub duration: u32,

    /// Output file; records are appended. A file created by this run is removed again if
    /// the server cannot be reached.
    pub out_file: PathBuf,

    /// Bandwidth cap in bits per second (values <= 0 mean 6000)
    #[arg(allow_negative_numbers = true)]
    pub throttle: Option<i64>,
}

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// JSON output
    Json,
    /// Human-readable output
    Human,
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(OutputFormat::Json),
            "human" => Ok(OutputFormat::Human),
            _ => Err(format!("Invalid output format: {s}")),
        }
    }
}

impl GetArgs {
    /// Validate the positional arguments into a request.
    pub fn to_request(&self) -> Result<DataRequest, CliError> {
        Ok(DataRequest::new(
            self.host.as_str(),
            self.port,
            self.id.as_str(),
            self.date.as_str(),
            self.time.as_str(),
            self.duration,
            self.throttle.unwrap_or(0),
        )?)
    }

    /// Run one session and report it.
    ///
    /// Returns the terminal state for completed and cancelled sessions; a failed session is
    /// reported and then returned as an error.
    pub async fn execute(&self, cli: &Cli, cancel: SharedCancel) -> Result<TerminalState, CliError> {
        let request = self.to_request()?;

        if let Some(addr) = cli.metrics_addr {
            crate::metrics::init_metrics(addr)
                .await
                .map_err(|e| CliError::ConfigurationError(e.to_string()))?;
        }

        let preexisting = tokio::fs::try_exists(&self.out_file).await.unwrap_or(true);
        let sink = FileSink::open_append(&self.out_file).await?;
        info!(output = %self.out_file.display(), request = %request, "Starting download");

        let handle = spawn_session_with_cancel(request, cli.session_config(), sink, cancel);

        let spinner = create_spinner(cli);
        while !handle.is_finished() {
            spinner.set_message(handle.progress().snapshot().format_progress());
            tokio::time::sleep(POLL_INTERVAL).await;
        }
        spinner.finish_and_clear();

        let mut summary = handle.join().await?;
        if !preexisting && summary.failure.as_ref().is_some_and(|e| e.is_connect_phase()) {
            remove_unused_output(&self.out_file).await;
        }
        match cli.output_format {
            OutputFormat::Json => output_json(&summary),
            OutputFormat::Human => output_human(&summary, &self.out_file),
        }

        match summary.failure.take() {
            Some(e) => Err(e.into()),
            None => Ok(summary.state),
        }
    }
}

/// Delete the empty file created for a session that never connected.
async fn remove_unused_output(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => debug!(output = %path.display(), "Removed unused output file"),
        Err(e) => warn!(output = %path.display(), error = %e, "Failed to remove unused output file"),
    }
}

fn create_spinner(cli: &Cli) -> ProgressBar {
    if cli.no_progress || cli.output_format == OutputFormat::Json {
        return ProgressBar::hidden();
    }

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {msg}")
            .expect("hardcoded template is valid"),
    );
    spinner.enable_steady_tick(Duration::from_millis(120));
    spinner
}

fn output_json(summary: &SessionSummary) {
    match serde_json::to_string(summary) {
        Ok(json) => println!("{json}"),
        Err(e) => warn!("Failed to serialize session report: {}", e),
    }
}

fn output_human(summary: &SessionSummary, out_file: &Path) {
    let secs = summary.elapsed.as_secs_f64();
    match summary.state {
        TerminalState::Completed => {
            println!("{} records collected in {secs:.2} seconds", summary.records);
            println!("Output: {}", out_file.display());
            if summary.records == 0 {
                eprintln!("Warning: no records were collected");
            }
            if !summary.terminator_seen {
                eprintln!("Warning: server closed the connection before its terminator record");
            }
        }
        TerminalState::Cancelled => {
            println!(
                "Cancelled: {} records collected in {secs:.2} seconds",
                summary.records
            );
        }
        TerminalState::Failed => {
            eprintln!(
                "Download failed after {} records ({secs:.2} seconds)",
                summary.records
            );
            if let Some(e) = &summary.failure {
                eprintln!("Error: {e}");
            }
        }
    }
}
