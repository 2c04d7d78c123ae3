//! Main entry point for the waveform-downloader CLI

use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;
use waveform_downloader::cancel::CancellationController;
use waveform_downloader::cli::{Cli, Commands};
use waveform_downloader::downloader::TerminalState;

/// Exit status for a session stopped by Ctrl+C (128 + SIGINT).
const EXIT_CANCELLED: i32 = 130;

/// Initialize tracing subscriber with optional JSON formatting
fn init_tracing() {
    let json_format = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("waveform_downloader=info"));

    // Logs go to stderr so stdout carries only the report.
    if json_format {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }
}

#[tokio::main]
async fn main() {
    init_tracing();

    let cli = Cli::parse();

    let cancel = CancellationController::shared();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Ctrl+C received - stopping after the current record...");
                cancel.request_cancel();
            }
        }
    });

    let result = match cli.command {
        Commands::Get(ref args) => args
            .execute(&cli, cancel.clone())
            .await
            .map_err(|e| anyhow::anyhow!(e)),
    };

    match result {
        Ok(TerminalState::Cancelled) => std::process::exit(EXIT_CANCELLED),
        Ok(_) => {}
        Err(e) => {
            error!("Command failed: {}", e);
            std::process::exit(1);
        }
    }
}
