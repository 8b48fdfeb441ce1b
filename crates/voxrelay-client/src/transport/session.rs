//! Transport session: one logical duplex link to the relay.
//!
//! Lifecycle: `Connecting -> Open -> Closing -> Closed`, then exactly one
//! reconnect attempt after the fixed delay, forever, until `shutdown`.
//! There is no heartbeat-timeout liveness check; a half-open connection is
//! noticed only when the transport itself reports an error or close.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use voxrelay_core::error::ErrorCode;
use voxrelay_core::protocol::{self, Envelope};
use voxrelay_core::SessionState;

use super::{Connector, Link};
use crate::event::{ClientEvent, EventBus};

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub heartbeat_interval: Duration,
    pub reconnect_delay: Duration,
    /// Outbound queue depth; a full queue drops the envelope.
    pub queue_depth: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval: Duration::from_secs(30),
            reconnect_delay: Duration::from_secs(3),
            queue_depth: 64,
        }
    }
}

/// Cloneable, non-blocking send handle.
#[derive(Clone)]
pub struct SessionSender {
    tx: mpsc::Sender<Envelope>,
    state: watch::Receiver<SessionState>,
}

impl SessionSender {
    /// Enqueue for transmission. Never blocks and never fails to the caller:
    /// when the session is not open or the queue is full the envelope is
    /// dropped and logged.
    pub fn send(&self, env: Envelope) {
        let state = *self.state.borrow();
        if !state.is_open() {
            tracing::debug!(%state, kind = env.kind().as_str(), "session not open, envelope dropped");
            return;
        }
        match self.tx.try_send(env) {
            Ok(()) => {}
            Err(TrySendError::Full(env)) => {
                tracing::warn!(kind = env.kind().as_str(), "outbound queue full, envelope dropped");
            }
            Err(TrySendError::Closed(_)) => {
                tracing::debug!("session task gone, envelope dropped");
            }
        }
    }

    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }
}

pub struct TransportSession {
    sender: SessionSender,
    last_pong: watch::Receiver<Option<Instant>>,
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl TransportSession {
    /// Start connecting immediately. Decoded audio and playback envelopes are
    /// delivered to `inbound`.
    pub fn spawn<C: Connector>(
        connector: C,
        cfg: SessionConfig,
        inbound: mpsc::Sender<Envelope>,
        events: EventBus,
    ) -> Self {
        let (out_tx, out_rx) = mpsc::channel(cfg.queue_depth.max(1));
        let (state_tx, state_rx) = watch::channel(SessionState::Connecting);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (pong_tx, pong_rx) = watch::channel(None);

        let runner = Runner {
            connector,
            cfg,
            inbound,
            events,
            state: state_tx,
            last_pong: pong_tx,
        };
        let task = tokio::spawn(runner.run(out_rx, shutdown_rx));

        Self {
            sender: SessionSender {
                tx: out_tx,
                state: state_rx,
            },
            last_pong: pong_rx,
            shutdown: shutdown_tx,
            task,
        }
    }

    pub fn send(&self, env: Envelope) {
        self.sender.send(env);
    }

    pub fn sender(&self) -> SessionSender {
        self.sender.clone()
    }

    pub fn state(&self) -> SessionState {
        self.sender.state()
    }

    /// Watch lifecycle transitions.
    pub fn state_changes(&self) -> watch::Receiver<SessionState> {
        self.sender.state.clone()
    }

    /// When the relay last answered a heartbeat. Informational only; it
    /// never closes the link.
    pub fn last_pong(&self) -> Option<Instant> {
        *self.last_pong.borrow()
    }

    /// Cancel reconnection, close the link, and wait for the task to end.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        let _ = self.task.await;
    }
}

/// Resolves once shutdown is requested or the owner is gone.
async fn shutdown_requested(rx: &mut watch::Receiver<bool>) {
    loop {
        if *rx.borrow() {
            return;
        }
        if rx.changed().await.is_err() {
            return;
        }
    }
}

struct Runner<C> {
    connector: C,
    cfg: SessionConfig,
    inbound: mpsc::Sender<Envelope>,
    events: EventBus,
    state: watch::Sender<SessionState>,
    last_pong: watch::Sender<Option<Instant>>,
}

impl<C: Connector> Runner<C> {
    fn set_state(&self, s: SessionState) {
        self.state.send_replace(s);
        tracing::debug!(state = %s, "session state");
    }

    async fn run(
        mut self,
        mut out_rx: mpsc::Receiver<Envelope>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        let mut attempt: u64 = 0;
        loop {
            attempt += 1;
            self.set_state(SessionState::Connecting);

            let connected = tokio::select! {
                r = self.connector.connect() => Some(r),
                _ = shutdown_requested(&mut shutdown) => None,
            };

            match connected {
                None => break,
                Some(Ok(link)) => {
                    self.set_state(SessionState::Open);
                    self.events.emit(ClientEvent::Connected);
                    tracing::info!(attempt, "connected to relay");
                    attempt = 0;

                    self.drive(link, &mut out_rx, &mut shutdown).await;

                    self.set_state(SessionState::Closing);
                    self.events.emit(ClientEvent::Disconnected);
                }
                Some(Err(e)) => {
                    tracing::warn!(attempt, error = %e, "connect failed");
                    self.events.error(&e);
                }
            }

            self.set_state(SessionState::Closed);
            // envelopes queued for the dead link are stale
            while out_rx.try_recv().is_ok() {}

            if *shutdown.borrow() {
                break;
            }
            tracing::info!(delay_ms = self.cfg.reconnect_delay.as_millis() as u64, "reconnect scheduled");
            tokio::select! {
                _ = tokio::time::sleep(self.cfg.reconnect_delay) => {}
                _ = shutdown_requested(&mut shutdown) => break,
            }
        }
        self.set_state(SessionState::Closed);
        tracing::info!("transport session stopped");
    }

    /// Pump one open link until it closes or shutdown is requested.
    async fn drive(
        &mut self,
        link: Link,
        out_rx: &mut mpsc::Receiver<Envelope>,
        shutdown: &mut watch::Receiver<bool>,
    ) {
        let Link { mut sink, mut stream } = link;
        let every = self.cfg.heartbeat_interval;
        let mut heartbeat = tokio::time::interval_at(Instant::now() + every, every);
        heartbeat.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown_requested(shutdown) => {
                    let _ = sink.close().await;
                    return;
                }

                maybe_out = out_rx.recv() => {
                    let Some(env) = maybe_out else { return; };
                    let bytes = env.payload_len();
                    let is_audio = matches!(env, Envelope::Audio(_));
                    let text = match protocol::encode(&env) {
                        Ok(t) => t,
                        Err(e) => {
                            tracing::error!(error = %e, "envelope encode failed");
                            continue;
                        }
                    };
                    if let Err(e) = sink.send(text).await {
                        tracing::warn!(error = %e, "send failed, closing link");
                        return;
                    }
                    if is_audio {
                        self.events.emit(ClientEvent::ChunkSent { bytes });
                    }
                }

                incoming = stream.next() => {
                    match incoming {
                        None => {
                            tracing::info!("relay closed the connection");
                            return;
                        }
                        Some(Err(e)) if e.code() == ErrorCode::TransportClosed => {
                            tracing::info!(error = %e, "link closed");
                            return;
                        }
                        Some(Err(e)) => {
                            tracing::warn!(error = %e, "inbound frame discarded");
                            self.events.error(&e);
                        }
                        Some(Ok(text)) => {
                            if let Some(reply) = self.on_receive(&text) {
                                let Ok(t) = protocol::encode(&reply) else { continue; };
                                if sink.send(t).await.is_err() {
                                    return;
                                }
                            }
                        }
                    }
                }

                _ = heartbeat.tick() => {
                    let Ok(ping) = protocol::encode(&Envelope::Ping) else { continue; };
                    if let Err(e) = sink.send(ping).await {
                        tracing::warn!(error = %e, "heartbeat send failed, closing link");
                        return;
                    }
                    tracing::trace!("heartbeat ping sent");
                }
            }
        }
    }

    /// Dispatch one inbound frame by kind. Returns a reply to send, if any.
    fn on_receive(&mut self, text: &str) -> Option<Envelope> {
        let env = match protocol::decode(text) {
            Ok(env) => env,
            Err(e) => {
                tracing::warn!(error = %e, "malformed envelope discarded");
                self.events.error(&e);
                return None;
            }
        };

        match env {
            Envelope::Audio(_) | Envelope::Playback(_) => {
                let bytes = env.payload_len();
                self.events.emit(ClientEvent::ChunkReceived { bytes });
                match self.inbound.try_send(env) {
                    Ok(()) => {}
                    Err(TrySendError::Full(_)) => {
                        tracing::warn!(bytes, "playback queue full, chunk dropped");
                    }
                    Err(TrySendError::Closed(_)) => {
                        tracing::debug!(bytes, "no playback consumer, chunk dropped");
                    }
                }
                None
            }
            Envelope::Pong => {
                self.last_pong.send_replace(Some(Instant::now()));
                tracing::trace!("heartbeat pong");
                None
            }
            Envelope::Ping => Some(Envelope::Pong),
        }
    }
}
