//! WebSocket handler.
//!
//! Responsibilities:
//! - Upgrade HTTP -> WS
//! - Register the session with the relay hub and remove it on exit
//! - Lifecycle: protocol ping + optional idle timeout
//! - Decode-once, then hand audio/ping envelopes to the hub
//!
//! The session's outbound queue sender lives in the hub only. When the hub
//! drops it (leave, or a send found the peer closed) the writer side ends and
//! the session closes.

use axum::{
    extract::{ws::Message, ws::WebSocket, ws::WebSocketUpgrade, State},
    response::Response,
};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::Instrument;

use voxrelay_core::protocol::Envelope;

use crate::app_state::AppState;
use crate::relay::{Connection, SessionId};
use crate::transport::codec::{decode, Inbound};

// --------------------
// Entry
// --------------------
pub async fn ws_upgrade(State(app): State<AppState>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| async move {
        run_session(app, socket).await;
    })
}

// --------------------
// Core session loop
// --------------------
async fn run_session(app: AppState, socket: WebSocket) {
    let gw = &app.cfg().gateway;
    let relay = app.relay();

    let (out_tx, out_rx) = mpsc::channel::<Message>(gw.queue_depth);
    let id = match relay.join(Connection { tx: out_tx }).await {
        Ok(id) => id,
        Err(e) => {
            tracing::error!(error = %e, "session rejected");
            return;
        }
    };

    let span = tracing::info_span!("session", session_id = %id);
    session_loop(&app, id, socket, out_rx).instrument(span).await;

    relay.leave(id).await;
}

async fn session_loop(
    app: &AppState,
    id: SessionId,
    socket: WebSocket,
    mut out_rx: mpsc::Receiver<Message>,
) {
    let gw = &app.cfg().gateway;
    let relay = app.relay();
    let (mut ws_tx, mut ws_rx) = socket.split();

    let ping_every = gw.ping_interval();
    let idle_timeout = gw.idle_timeout();
    let mut ping_tick = tokio::time::interval_at(Instant::now() + ping_every, ping_every);
    ping_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    let mut last_activity = Instant::now();

    tracing::info!("session open");

    loop {
        let idle_deadline = idle_timeout.map(|t| last_activity + t);

        tokio::select! {
            // outbound writer
            maybe_out = out_rx.recv() => {
                match maybe_out {
                    Some(m) => {
                        if ws_tx.send(m).await.is_err() {
                            break;
                        }
                    }
                    // hub dropped us
                    None => break,
                }
            }

            // inbound reader
            incoming = ws_rx.next() => {
                let Some(incoming) = incoming else { break; };
                let Ok(msg) = incoming else { break; };
                last_activity = Instant::now();

                match decode(msg) {
                    Ok(Inbound::Envelope { env, frame }) => match env {
                        Envelope::Audio(chunk) => {
                            if relay.audio(id, chunk, frame).await.is_err() {
                                break;
                            }
                        }
                        Envelope::Ping => {
                            if relay.ping(id).await.is_err() {
                                break;
                            }
                        }
                        Envelope::Pong => {}
                        Envelope::Playback(_) => {
                            tracing::warn!("playback envelopes are server-to-client only, ignored");
                        }
                    },
                    Ok(Inbound::Ping(payload)) => {
                        if ws_tx.send(Message::Pong(payload)).await.is_err() {
                            break;
                        }
                    }
                    Ok(Inbound::Pong(_)) => {}
                    Ok(Inbound::Close) => break,
                    Err(e) => {
                        tracing::warn!(error = %e, code = e.code().as_str(), "inbound frame discarded");
                    }
                }
            }

            // protocol keepalive
            _ = ping_tick.tick() => {
                if ws_tx.send(Message::Ping(Vec::new())).await.is_err() {
                    break;
                }
            }

            // idle timeout
            _ = sleep_until_opt(idle_deadline) => {
                tracing::info!("idle timeout");
                break;
            }
        }
    }

    relay.closing(id).await;
    let _ = ws_tx.close().await;
    tracing::info!("session closed");
}

async fn sleep_until_opt(deadline: Option<Instant>) {
    match deadline {
        Some(d) => tokio::time::sleep_until(d).await,
        None => std::future::pending().await,
    }
}
