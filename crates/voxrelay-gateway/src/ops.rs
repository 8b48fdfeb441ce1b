//! Operational HTTP endpoints.

use axum::{extract::State, http::StatusCode, response::IntoResponse};

use crate::app_state::AppState;

/// Liveness; also reports how many sessions the relay currently holds.
pub async fn healthz(State(state): State<AppState>) -> impl IntoResponse {
    match state.relay().session_count().await {
        Ok(n) => (StatusCode::OK, format!("ok sessions={n}")),
        Err(_) => (StatusCode::SERVICE_UNAVAILABLE, "relay stopped".to_string()),
    }
}
