//! In-process connector: links backed by channels instead of sockets.
//!
//! Used to embed a client next to an in-process peer and to script connection
//! behavior (drops, refused connects) in tests.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::time::Instant;

use voxrelay_core::error::{Result, VoxError};

use super::{Connector, Link};

/// The far end of an in-memory link.
pub struct RemoteEnd {
    /// Frames the client sent.
    pub rx: mpsc::Receiver<String>,
    /// Push frames to the client. Dropping this (and `rx`) closes the link.
    pub tx: mpsc::Sender<String>,
}

/// Build a connected link pair.
pub fn pair(depth: usize) -> (Link, RemoteEnd) {
    let (to_remote, remote_rx) = mpsc::channel::<String>(depth.max(1));
    let (remote_tx, from_remote) = mpsc::channel::<String>(depth.max(1));

    let sink = futures_util::sink::unfold(to_remote, |tx: mpsc::Sender<String>, text: String| async move {
        tx.send(text)
            .await
            .map_err(|_| VoxError::TransportClosed("remote end dropped".into()))?;
        Ok::<_, VoxError>(tx)
    });
    let stream = futures_util::stream::unfold(from_remote, |mut rx| async move {
        rx.recv().await.map(|t| (Ok(t), rx))
    });

    let link = Link {
        sink: Box::pin(sink),
        stream: Box::pin(stream),
    };
    (link, RemoteEnd { rx: remote_rx, tx: remote_tx })
}

/// Connector that hands out pre-built links in order, then refuses.
#[derive(Default)]
pub struct ScriptedConnector {
    links: Mutex<VecDeque<Link>>,
    attempts: Mutex<Vec<Instant>>,
}

impl ScriptedConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a link for a future `connect` call.
    pub fn push(&self, link: Link) {
        if let Ok(mut q) = self.links.lock() {
            q.push_back(link);
        }
    }

    /// When each `connect` call happened.
    pub fn attempts(&self) -> Vec<Instant> {
        self.attempts.lock().map(|a| a.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Connector for ScriptedConnector {
    async fn connect(&self) -> Result<Link> {
        if let Ok(mut a) = self.attempts.lock() {
            a.push(Instant::now());
        }
        let next = self.links.lock().ok().and_then(|mut q| q.pop_front());
        next.ok_or_else(|| VoxError::TransportClosed("connection refused".into()))
    }
}
