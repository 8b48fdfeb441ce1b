use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::Message;
use tokio::sync::{mpsc, oneshot};
use tokio::sync::mpsc::error::TrySendError;
use tokio::time::Instant;

use voxrelay_core::audio::AudioChunk;
use voxrelay_core::error::{Result, VoxError};
use voxrelay_core::protocol::{self, Envelope};

use crate::config::{BroadcastPolicy, RelaySection};
use crate::relay::registry::{Connection, SessionId, SessionRegistry};
use crate::relay::replay::ReplayCycle;

/// Messages from per-session tasks to the hub.
pub enum HubCommand {
    Join { id: SessionId, conn: Connection },
    /// The session is shutting down; stop sending to it.
    Closing { id: SessionId },
    Leave { id: SessionId },
    /// Inbound audio. `frame` is the original text frame, forwarded as-is.
    Audio {
        from: SessionId,
        chunk: AudioChunk,
        frame: String,
    },
    Ping { from: SessionId },
    Count { reply: oneshot::Sender<usize> },
}

/// Cloneable front door to the hub task.
#[derive(Clone)]
pub struct RelayHandle {
    tx: mpsc::Sender<HubCommand>,
    next_id: Arc<AtomicU64>,
}

impl RelayHandle {
    fn closed() -> VoxError {
        VoxError::Internal("relay hub stopped".into())
    }

    /// Register a new session and return its identity.
    pub async fn join(&self, conn: Connection) -> Result<SessionId> {
        let id = SessionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.tx
            .send(HubCommand::Join { id, conn })
            .await
            .map_err(|_| Self::closed())?;
        Ok(id)
    }

    pub async fn closing(&self, id: SessionId) {
        let _ = self.tx.send(HubCommand::Closing { id }).await;
    }

    pub async fn leave(&self, id: SessionId) {
        let _ = self.tx.send(HubCommand::Leave { id }).await;
    }

    pub async fn audio(&self, from: SessionId, chunk: AudioChunk, frame: String) -> Result<()> {
        self.tx
            .send(HubCommand::Audio { from, chunk, frame })
            .await
            .map_err(|_| Self::closed())
    }

    pub async fn ping(&self, from: SessionId) -> Result<()> {
        self.tx
            .send(HubCommand::Ping { from })
            .await
            .map_err(|_| Self::closed())
    }

    pub async fn session_count(&self) -> Result<usize> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(HubCommand::Count { reply })
            .await
            .map_err(|_| Self::closed())?;
        rx.await.map_err(|_| Self::closed())
    }
}

/// Spawn the hub task and return its handle. The task ends once every handle
/// is dropped.
pub fn spawn(cfg: &RelaySection, depth: usize) -> RelayHandle {
    let (tx, rx) = mpsc::channel(depth.max(1));
    let hub = RelayHub::new(cfg);
    tokio::spawn(hub.run(rx));
    RelayHandle {
        tx,
        next_id: Arc::new(AtomicU64::new(1)),
    }
}

/// Owns the session registry; serializes mutation and broadcast iteration.
pub struct RelayHub {
    registry: SessionRegistry,
    policy: BroadcastPolicy,
    replay: Option<ReplayCycle>,
}

impl RelayHub {
    pub fn new(cfg: &RelaySection) -> Self {
        let replay = (cfg.policy == BroadcastPolicy::Replay).then(|| {
            ReplayCycle::new(
                Duration::from_millis(cfg.replay.record_ms),
                Duration::from_millis(cfg.replay.playback_ms),
                Instant::now(),
            )
        });
        Self {
            registry: SessionRegistry::new(),
            policy: cfg.policy,
            replay,
        }
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    pub async fn run(mut self, mut rx: mpsc::Receiver<HubCommand>) {
        tracing::info!(policy = ?self.policy, "relay hub started");
        while let Some(cmd) = rx.recv().await {
            self.apply(cmd);
        }
        tracing::info!("relay hub stopped");
    }

    /// Apply one command. Never blocks: every peer send is a `try_send`.
    pub fn apply(&mut self, cmd: HubCommand) {
        match cmd {
            HubCommand::Join { id, conn } => {
                self.registry.insert(id, conn, Instant::now());
                tracing::info!(session_id = %id, total = self.registry.len(), "session joined");
            }
            HubCommand::Closing { id } => {
                if self.registry.mark_closing(id) {
                    tracing::debug!(session_id = %id, "session closing");
                }
            }
            HubCommand::Leave { id } => {
                if self.registry.remove(id).is_some() {
                    tracing::info!(session_id = %id, total = self.registry.len(), "session left");
                }
            }
            HubCommand::Audio { from, chunk, frame } => self.on_audio(from, chunk, frame),
            HubCommand::Ping { from } => {
                if self.registry.touch(from, Instant::now()) {
                    self.send_envelope(&[from], &Envelope::Pong);
                }
            }
            HubCommand::Count { reply } => {
                let _ = reply.send(self.registry.len());
            }
        }
    }

    fn on_audio(&mut self, from: SessionId, chunk: AudioChunk, frame: String) {
        tracing::debug!(session_id = %from, bytes = chunk.len(), "audio received");
        match self.policy {
            BroadcastPolicy::FanOut => {
                let targets = self.registry.others(from);
                self.send_text(&targets, &frame);
            }
            BroadcastPolicy::Echo => self.send_text(&[from], &frame),
            BroadcastPolicy::Replay => {
                let Some(cycle) = self.replay.as_mut() else { return; };
                let Some(batch) = cycle.on_audio(Instant::now(), chunk) else { return; };
                if batch.is_empty() {
                    tracing::warn!("no recorded audio to replay");
                    return;
                }
                tracing::info!(chunks = batch.len(), "replaying recorded audio to all sessions");
                let targets = self.registry.all();
                self.send_envelope(&targets, &Envelope::Playback(batch));
            }
        }
    }

    fn send_envelope(&mut self, targets: &[SessionId], env: &Envelope) {
        match protocol::encode(env) {
            Ok(text) => self.send_text(targets, &text),
            Err(e) => tracing::error!(error = %e, "envelope encode failed"),
        }
    }

    /// Best-effort delivery to each target. A full queue drops this frame for
    /// that peer only; a closed queue removes the peer.
    fn send_text(&mut self, targets: &[SessionId], text: &str) {
        let mut gone = Vec::new();
        for id in targets {
            let Some(rec) = self.registry.get(*id) else { continue; };
            match rec.conn.tx.try_send(Message::Text(text.to_owned())) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    tracing::warn!(session_id = %id, "peer queue full, frame dropped");
                }
                Err(TrySendError::Closed(_)) => gone.push(*id),
            }
        }
        for id in gone {
            self.registry.remove(id);
            tracing::debug!(session_id = %id, "peer closed during broadcast, removed");
        }
    }
}
