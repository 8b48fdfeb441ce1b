//! Client assembly: wires capture, transport, and playback from a config.

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use voxrelay_core::error::Result;
use voxrelay_core::protocol::Envelope;
use voxrelay_core::SessionState;

use crate::capture::{start_capture, CaptureHandle, CaptureSource, EncodedChunk, ToneSource, WavFileSource};
use crate::config::{ClientConfig, SourceSpec};
use crate::event::EventBus;
use crate::playback::{DiscardSink, PlaybackSink, PlaybackStats, Reassembler, WavFileSink};
use crate::transport::{Connector, SessionSender, TransportSession, WsConnector};

/// Inbound queue between the transport session and the reassembler.
const PLAYBACK_QUEUE_DEPTH: usize = 256;

fn build_source(spec: &SourceSpec) -> Box<dyn CaptureSource> {
    match spec {
        SourceSpec::Tone {
            frequency_hz,
            sample_rate,
            channels,
        } => Box::new(ToneSource::new(
            *frequency_hz,
            voxrelay_core::audio::AudioSpec::new(*sample_rate, *channels),
        )),
        SourceSpec::WavFile { path } => Box::new(WavFileSource::new(path)),
    }
}

/// A running client.
pub struct Client {
    session: TransportSession,
    capture: Option<CaptureHandle>,
    forwarder: Option<JoinHandle<()>>,
    playback: Option<JoinHandle<PlaybackStats>>,
    events: EventBus,
}

impl Client {
    /// Start against the WebSocket relay named in `cfg.relay.url`.
    pub async fn start(cfg: &ClientConfig, events: EventBus) -> Result<Self> {
        Self::start_with(WsConnector::new(cfg.relay.url.as_str()), cfg, events).await
    }

    /// Start over any connector.
    ///
    /// Capture is opened first so `CaptureUnavailable` / `EncodingUnavailable`
    /// are reported before anything connects.
    pub async fn start_with<C: Connector>(
        connector: C,
        cfg: &ClientConfig,
        events: EventBus,
    ) -> Result<Self> {
        let (chunk_tx, chunk_rx) = mpsc::channel::<EncodedChunk>(cfg.capture.queue_depth);
        let capture = if cfg.capture.enabled {
            let source = build_source(&cfg.capture.source);
            match start_capture(source, &cfg.capture.encoder(), chunk_tx, events.clone()).await {
                Ok(h) => Some(h),
                Err(e) => {
                    events.error(&e);
                    return Err(e);
                }
            }
        } else {
            drop(chunk_tx);
            None
        };

        let (inbound_tx, inbound_rx) = mpsc::channel::<Envelope>(PLAYBACK_QUEUE_DEPTH);
        let playback = if cfg.playback.enabled {
            let sink: Box<dyn PlaybackSink> = match &cfg.playback.output {
                Some(path) => Box::new(WavFileSink::new(path)),
                None => Box::new(DiscardSink::default()),
            };
            let reassembler = Reassembler::new(&cfg.playback.reassembler(), sink, events.clone());
            Some(tokio::spawn(reassembler.run(inbound_rx)))
        } else {
            drop(inbound_rx);
            None
        };

        let session = TransportSession::spawn(connector, cfg.relay.session(), inbound_tx, events.clone());
        let forwarder = capture
            .as_ref()
            .map(|_| tokio::spawn(forward(chunk_rx, session.sender())));

        if let Some(h) = &capture {
            tracing::info!(format = %h.format(), sample_rate = h.spec().sample_rate, "client started");
        } else {
            tracing::info!("client started (receive only)");
        }

        Ok(Self {
            session,
            capture,
            forwarder,
            playback,
            events,
        })
    }

    pub fn state(&self) -> SessionState {
        self.session.state()
    }

    pub fn sender(&self) -> SessionSender {
        self.session.sender()
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Stop capture, close the session, and drain playback.
    pub async fn shutdown(mut self) -> Option<PlaybackStats> {
        if let Some(capture) = self.capture.take() {
            capture.stop().await;
        }
        if let Some(forwarder) = self.forwarder.take() {
            let _ = forwarder.await;
        }
        self.session.shutdown().await;
        match self.playback.take() {
            Some(task) => task.await.ok(),
            None => None,
        }
    }
}

/// Encoder output -> transport. Ends when capture stops.
async fn forward(mut rx: mpsc::Receiver<EncodedChunk>, sender: SessionSender) {
    while let Some(c) = rx.recv().await {
        tracing::trace!(seq = c.seq, at_ms = c.captured_at.as_millis() as u64, "forwarding chunk");
        sender.send(Envelope::Audio(c.chunk));
    }
}
