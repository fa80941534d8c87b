//! CLI entry point for gaze-relay.
//!
//! Wires the two long-running components together: a [`TrackerReader`]
//! connected to the eye tracker, and a [`RelayServer`] fanning the raw
//! stream out to downstream clients. Raw chunks flow from the reader's
//! chunk tap into `broadcast()`; framing and the latest-value slot keep
//! working alongside for any embedded consumer.
//!
//! Retry policy lives here, not in the library: the initial tracker
//! connection failing is fatal, while a drop after a good session is retried
//! with the configured reconnect delay.

use anyhow::{Context, Result};
use clap::Parser;
use gaze_relay::config::Settings;
use gaze_relay::logging;
use gaze_relay::reader::TrackerReader;
use gaze_relay::relay::RelayServer;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[derive(Parser)]
#[command(name = "gaze-relay")]
#[command(about = "Gazepoint acquisition and relay service", long_about = None)]
struct Cli {
    /// Config name under config/ (without extension)
    #[arg(long)]
    config: Option<String>,

    /// Override the tracker host
    #[arg(long)]
    tracker_host: Option<String>,

    /// Override the tracker port
    #[arg(long)]
    tracker_port: Option<u16>,

    /// Override the relay listen port
    #[arg(long)]
    relay_port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut settings = Settings::new(cli.config.as_deref()).context("loading configuration")?;
    if let Some(host) = cli.tracker_host {
        settings.tracker.host = host;
    }
    if let Some(port) = cli.tracker_port {
        settings.tracker.port = port;
    }
    if let Some(port) = cli.relay_port {
        settings.relay.port = port;
    }
    settings.validate().context("validating configuration")?;

    logging::init(settings.log_level.as_deref())?;

    let relay = Arc::new(RelayServer::new(settings.relay.clone()));
    relay.start().await.context("starting relay server")?;

    let result = tokio::select! {
        res = run(&settings, Arc::clone(&relay)) => res,
        _ = tokio::signal::ctrl_c() => {
            info!("Shutting down on Ctrl-C");
            Ok(())
        }
    };

    relay.stop().await;
    result
}

/// Connect to the tracker and pump its stream into the relay, reconnecting
/// after a dropped session.
async fn run(settings: &Settings, relay: Arc<RelayServer>) -> Result<()> {
    let mut first_attempt = true;
    loop {
        let (tap_tx, mut tap_rx) = mpsc::channel(64);
        let mut reader = TrackerReader::new(settings.tracker.clone(), settings.frame.clone())
            .with_chunk_tap(tap_tx);

        match reader.connect().await {
            Ok(()) => {
                first_attempt = false;
                // Runs until the receive loop exits and drops the tap.
                while let Some(chunk) = tap_rx.recv().await {
                    relay.broadcast(&chunk).await;
                }
                warn!(state = ?reader.state(), "Tracker stream ended");
            }
            Err(e) if first_attempt => {
                // No session ever succeeded; treat the endpoint as wrong.
                return Err(e).context("connecting to tracker");
            }
            Err(e) => error!(error = %e, "Reconnect attempt failed"),
        }
        reader.disconnect().await;

        info!(
            delay = ?settings.tracker.reconnect_delay,
            "Reconnecting to tracker"
        );
        tokio::time::sleep(settings.tracker.reconnect_delay).await;
    }
}
