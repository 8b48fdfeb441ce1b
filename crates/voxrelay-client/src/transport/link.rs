use std::future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use tokio_tungstenite::tungstenite::Message;

use voxrelay_core::error::{Result, VoxError};

/// Outbound half: one text frame per item.
pub type TextSink = Pin<Box<dyn Sink<String, Error = VoxError> + Send>>;

/// Inbound half. `TransportClosed` items end the connection; other errors
/// are per-frame and the connection stays up.
pub type TextStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// One established duplex connection.
pub struct Link {
    pub sink: TextSink,
    pub stream: TextStream,
}

/// Establishes connections to the relay. Each call is a fresh session.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    async fn connect(&self) -> Result<Link>;
}

#[async_trait]
impl<C: Connector> Connector for Arc<C> {
    async fn connect(&self) -> Result<Link> {
        (**self).connect().await
    }
}

/// WebSocket connector for `ws://` / `wss://` relay endpoints.
#[derive(Debug, Clone)]
pub struct WsConnector {
    url: String,
}

impl WsConnector {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl Connector for WsConnector {
    async fn connect(&self) -> Result<Link> {
        let (ws, _resp) = tokio_tungstenite::connect_async(self.url.as_str())
            .await
            .map_err(|e| VoxError::TransportClosed(format!("connect {}: {e}", self.url)))?;
        let (sink, stream) = ws.split();

        let sink = sink
            .sink_map_err(|e| VoxError::TransportClosed(e.to_string()))
            .with(|text: String| future::ready(Ok::<_, VoxError>(Message::Text(text))));

        let stream = stream.filter_map(|msg| {
            future::ready(match msg {
                Ok(Message::Text(t)) => Some(Ok(t)),
                Ok(Message::Binary(b)) => Some(Err(VoxError::MalformedEnvelope(format!(
                    "binary frame of {} bytes is not an envelope",
                    b.len()
                )))),
                Ok(Message::Close(_)) => {
                    Some(Err(VoxError::TransportClosed("closed by relay".into())))
                }
                // protocol ping/pong is answered by tungstenite
                Ok(_) => None,
                Err(e) => Some(Err(VoxError::TransportClosed(e.to_string()))),
            })
        });

        Ok(Link {
            sink: Box::pin(sink),
            stream: Box::pin(stream),
        })
    }
}
