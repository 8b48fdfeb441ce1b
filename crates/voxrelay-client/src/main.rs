//! voxrelay client.
//!
//! - Captures from the configured source and streams chunks to the relay
//! - Plays whatever the relay sends back
//! - Logs client events; stops on Ctrl-C

use std::process::ExitCode;

use tracing_subscriber::{fmt, EnvFilter};

use voxrelay_client::config;
use voxrelay_client::event::{ClientEvent, EventBus};
use voxrelay_client::Client;

const DEFAULT_CONFIG: &str = "voxrelay-client.yaml";

#[tokio::main]
async fn main() -> ExitCode {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let path = std::env::args().nth(1).unwrap_or_else(|| DEFAULT_CONFIG.to_string());
    let cfg = match config::load_from_file(&path) {
        Ok(cfg) => cfg,
        Err(e) => {
            tracing::error!(error = %e, path = %path, "config load failed");
            return ExitCode::FAILURE;
        }
    };

    let events = EventBus::default();
    let mut sub = events.subscribe();
    tokio::spawn(async move {
        while let Ok(ev) = sub.recv().await {
            match ev {
                ClientEvent::Connected => tracing::info!("connected"),
                ClientEvent::Disconnected => tracing::info!("disconnected"),
                ClientEvent::ChunkSent { bytes } => tracing::debug!(bytes, "chunk sent"),
                ClientEvent::ChunkReceived { bytes } => tracing::debug!(bytes, "chunk received"),
                ClientEvent::Error { code, message } => {
                    tracing::warn!(code = code.as_str(), %message, "client error")
                }
            }
        }
    });

    tracing::info!(url = %cfg.relay.url, "voxrelay-client starting");
    let client = match Client::start(&cfg, events).await {
        Ok(c) => c,
        Err(e) => {
            tracing::error!(error = %e, code = e.code().as_str(), "client failed to start");
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "signal handler failed");
    }
    tracing::info!("shutting down");
    if let Some(stats) = client.shutdown().await {
        tracing::info!(played = stats.played, dropped = stats.dropped, "playback summary");
    }
    ExitCode::SUCCESS
}
