//! Client events for UI collaborators.

use tokio::sync::broadcast;
use voxrelay_core::{ErrorCode, VoxError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    Connected,
    Disconnected,
    ChunkSent { bytes: usize },
    ChunkReceived { bytes: usize },
    Error { code: ErrorCode, message: String },
}

/// Fire-and-forget event fan-out. Slow subscribers lag, they never block
/// the pipeline.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<ClientEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ClientEvent> {
        self.tx.subscribe()
    }

    pub fn emit(&self, ev: ClientEvent) {
        let _ = self.tx.send(ev);
    }

    pub fn error(&self, err: &VoxError) {
        self.emit(ClientEvent::Error {
            code: err.code(),
            message: err.to_string(),
        });
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
