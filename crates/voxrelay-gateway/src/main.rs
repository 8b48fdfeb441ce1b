//! voxrelay relay server.
//!
//! - WebSocket endpoint: /ws
//! - Decode-once pipeline: WS Message -> Envelope -> relay hub
//! - Tracing span per session
//! - Protocol ping + optional idle timeout

use std::process::ExitCode;

use tracing_subscriber::{fmt, EnvFilter};

use voxrelay_gateway::{app_state, config, router};

const DEFAULT_CONFIG: &str = "voxrelay.yaml";

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
    let listen = match cfg.gateway.listen_addr() {
        Ok(addr) => addr,
        Err(e) => {
            tracing::error!(error = %e, "bad listen address");
            return ExitCode::FAILURE;
        }
    };

    let policy = cfg.relay.policy;
    let state = app_state::AppState::new(cfg);
    let app = router::build_router(state);

    let listener = match tokio::net::TcpListener::bind(listen).await {
        Ok(l) => l,
        Err(e) => {
            tracing::error!(error = %e, %listen, "failed to bind");
            return ExitCode::FAILURE;
        }
    };
    tracing::info!(%listen, ?policy, "voxrelay-gateway starting");

    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!(error = %e, "server failed");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}
