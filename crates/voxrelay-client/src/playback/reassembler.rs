//! Playback reassembler.
//!
//! Turns received chunks back into audio:
//! - decode with an ordered list of strategies; the first one whose output the
//!   sink accepts wins
//! - a chunk no strategy can handle is dropped with a warning, the stream goes on
//! - single chunks play immediately, batches play in order with a fixed gap

use std::time::Duration;

use tokio::sync::mpsc;

use voxrelay_core::audio::{decoders_for, AudioChunk, AudioFormat, AudioSpec, ChunkDecoder};
use voxrelay_core::error::VoxError;
use voxrelay_core::protocol::Envelope;

use super::PlaybackSink;
use crate::event::EventBus;

#[derive(Debug, Clone)]
pub struct ReassemblerConfig {
    /// Strategy order.
    pub formats: Vec<AudioFormat>,
    /// Encoder format agreed out of band; when set only that strategy runs.
    pub known_format: Option<AudioFormat>,
    /// Layout for headerless slices.
    pub stream_spec: AudioSpec,
    /// Pause between consecutive chunks of a batch.
    pub batch_gap: Duration,
}

impl Default for ReassemblerConfig {
    fn default() -> Self {
        Self {
            formats: vec![AudioFormat::Wav, AudioFormat::L16],
            known_format: None,
            stream_spec: AudioSpec::new(16_000, 1),
            batch_gap: Duration::from_millis(50),
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PlaybackStats {
    pub played: u64,
    pub dropped: u64,
}

pub struct Reassembler<S: PlaybackSink> {
    decoders: Vec<Box<dyn ChunkDecoder>>,
    sink: S,
    batch_gap: Duration,
    events: EventBus,
    stats: PlaybackStats,
}

impl<S: PlaybackSink> Reassembler<S> {
    pub fn new(cfg: &ReassemblerConfig, sink: S, events: EventBus) -> Self {
        let decoders = match cfg.known_format {
            Some(f) => decoders_for(&[f], cfg.stream_spec),
            None => decoders_for(&cfg.formats, cfg.stream_spec),
        };
        tracing::debug!(
            strategies = ?decoders.iter().map(|d| d.format()).collect::<Vec<_>>(),
            sink = sink.name(),
            "reassembler ready"
        );
        Self {
            decoders,
            sink,
            batch_gap: cfg.batch_gap,
            events,
            stats: PlaybackStats::default(),
        }
    }

    pub fn stats(&self) -> PlaybackStats {
        self.stats
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Decode and play one chunk. Returns whether it was played.
    pub async fn on_chunk(&mut self, chunk: &AudioChunk) -> bool {
        let mut last_err = None;
        for d in &self.decoders {
            let pcm = match d.try_decode(chunk) {
                Ok(pcm) => pcm,
                Err(e) => {
                    tracing::trace!(format = %d.format(), error = %e, "strategy declined");
                    last_err = Some(e);
                    continue;
                }
            };
            match self.sink.play(pcm).await {
                Ok(()) => {
                    self.stats.played += 1;
                    tracing::trace!(format = %d.format(), bytes = chunk.len(), "chunk played");
                    return true;
                }
                Err(e) => {
                    tracing::trace!(format = %d.format(), error = %e, "sink refused output");
                    last_err = Some(e);
                }
            }
        }

        let reason = last_err.map(|e| e.to_string()).unwrap_or_else(|| "no decoder strategies".into());
        let err = VoxError::DecodeFailed(reason);
        tracing::warn!(bytes = chunk.len(), error = %err, "chunk dropped");
        self.events.error(&err);
        self.stats.dropped += 1;
        false
    }

    /// Play an ordered batch, pausing `batch_gap` between chunks.
    pub async fn on_batch(&mut self, chunks: &[AudioChunk]) {
        if chunks.is_empty() {
            tracing::warn!("empty playback batch");
            return;
        }
        tracing::info!(chunks = chunks.len(), "playing batch");
        for (i, chunk) in chunks.iter().enumerate() {
            if i > 0 {
                tokio::time::sleep(self.batch_gap).await;
            }
            self.on_chunk(chunk).await;
        }
    }

    /// Consume inbound envelopes until the channel closes, then finish the sink.
    pub async fn run(mut self, mut rx: mpsc::Receiver<Envelope>) -> PlaybackStats {
        while let Some(env) = rx.recv().await {
            match env {
                Envelope::Audio(chunk) => {
                    self.on_chunk(&chunk).await;
                }
                Envelope::Playback(chunks) => self.on_batch(&chunks).await,
                Envelope::Ping | Envelope::Pong => {}
            }
        }
        if let Err(e) = self.sink.finish().await {
            tracing::error!(sink = self.sink.name(), error = %e, "playback sink finish failed");
            self.events.error(&e);
        }
        tracing::info!(played = self.stats.played, dropped = self.stats.dropped, "playback stopped");
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use tokio::time::Instant;

    use voxrelay_core::audio::{wav, PcmBlock};
    use voxrelay_core::error::Result;
    use voxrelay_core::ErrorCode;

    use super::*;
    use crate::event::ClientEvent;

    #[derive(Default)]
    struct Recorder {
        played: Vec<(Instant, PcmBlock)>,
        finished: bool,
        only: Option<AudioSpec>,
    }

    #[async_trait]
    impl PlaybackSink for Recorder {
        fn name(&self) -> &str {
            "recorder"
        }

        async fn play(&mut self, pcm: PcmBlock) -> Result<()> {
            if let Some(only) = self.only {
                if pcm.spec != only {
                    return Err(VoxError::DecodeFailed("layout".into()));
                }
            }
            self.played.push((Instant::now(), pcm));
            Ok(())
        }

        async fn finish(&mut self) -> Result<()> {
            self.finished = true;
            Ok(())
        }
    }

    fn wav_chunk(samples: &[i16]) -> AudioChunk {
        AudioChunk::new(wav::encode(&AudioSpec::new(16_000, 1), samples))
    }

    #[tokio::test]
    async fn corrupt_chunk_is_dropped_and_stream_continues() {
        let events = EventBus::default();
        let mut ev_rx = events.subscribe();
        let mut r = Reassembler::new(&ReassemblerConfig::default(), Recorder::default(), events);

        // odd length and no RIFF tag: neither strategy can use it
        let corrupt = AudioChunk::new(vec![1u8, 2, 3]);
        assert!(r.on_chunk(&wav_chunk(&[1, 2])).await);
        assert!(!r.on_chunk(&corrupt).await);
        assert!(r.on_chunk(&wav_chunk(&[3, 4])).await);

        assert_eq!(r.stats(), PlaybackStats { played: 2, dropped: 1 });
        let played: Vec<_> = r.sink().played.iter().map(|(_, p)| p.samples.clone()).collect();
        assert_eq!(played, vec![vec![1, 2], vec![3, 4]]);

        match ev_rx.try_recv().unwrap() {
            ClientEvent::Error { code, .. } => assert_eq!(code, ErrorCode::DecodeFailed),
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[tokio::test]
    async fn falls_back_to_next_strategy() {
        let mut r = Reassembler::new(&ReassemblerConfig::default(), Recorder::default(), EventBus::default());
        // raw L16 is not a WAV file
        let raw = AudioChunk::new(vec![0x01, 0x00, 0x02, 0x00]);
        assert!(r.on_chunk(&raw).await);
        assert_eq!(r.sink().played[0].1.samples, vec![1, 2]);
    }

    #[tokio::test]
    async fn wav_refused_by_sink_is_dropped_not_played_as_l16() {
        let sink = Recorder {
            only: Some(AudioSpec::new(16_000, 1)),
            ..Recorder::default()
        };
        let events = EventBus::default();
        let mut ev_rx = events.subscribe();
        let mut r = Reassembler::new(&ReassemblerConfig::default(), sink, events);

        assert!(r.on_chunk(&wav_chunk(&[100, 200])).await);
        // valid WAV in another layout: the sink refuses it and L16 must not
        // reinterpret the header as samples
        let other = AudioChunk::new(wav::encode(&AudioSpec::new(8_000, 1), &[7, 7]));
        assert!(!r.on_chunk(&other).await);

        assert_eq!(r.stats(), PlaybackStats { played: 1, dropped: 1 });
        assert_eq!(r.sink().played.len(), 1);
        assert_eq!(r.sink().played[0].1.samples, vec![100, 200]);
        match ev_rx.try_recv().unwrap() {
            ClientEvent::Error { code, .. } => assert_eq!(code, ErrorCode::DecodeFailed),
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[tokio::test]
    async fn known_format_tries_only_that_strategy() {
        let cfg = ReassemblerConfig {
            known_format: Some(AudioFormat::Wav),
            ..ReassemblerConfig::default()
        };
        let mut r = Reassembler::new(&cfg, Recorder::default(), EventBus::default());
        let raw = AudioChunk::new(vec![0x01, 0x00, 0x02, 0x00]);
        assert!(!r.on_chunk(&raw).await);
        assert!(r.on_chunk(&wav_chunk(&[5])).await);
        assert_eq!(r.stats(), PlaybackStats { played: 1, dropped: 1 });
    }

    #[tokio::test(start_paused = true)]
    async fn batch_plays_in_order_with_gap() {
        let mut r = Reassembler::new(&ReassemblerConfig::default(), Recorder::default(), EventBus::default());
        let batch = vec![wav_chunk(&[1]), wav_chunk(&[2]), wav_chunk(&[3])];
        r.on_batch(&batch).await;

        let played = &r.sink().played;
        let order: Vec<i16> = played.iter().map(|(_, p)| p.samples[0]).collect();
        assert_eq!(order, vec![1, 2, 3]);
        for pair in played.windows(2) {
            assert!(pair[1].0 - pair[0].0 >= Duration::from_millis(50));
        }
    }

    #[tokio::test]
    async fn run_finishes_sink_when_inbound_closes() {
        let (tx, rx) = mpsc::channel(8);
        let r = Reassembler::new(&ReassemblerConfig::default(), Recorder::default(), EventBus::default());
        let task = tokio::spawn(r.run(rx));

        tx.send(Envelope::Audio(wav_chunk(&[1]))).await.unwrap();
        tx.send(Envelope::Pong).await.unwrap();
        tx.send(Envelope::Playback(vec![wav_chunk(&[2]), wav_chunk(&[3])]))
            .await
            .unwrap();
        drop(tx);

        let stats = task.await.unwrap();
        assert_eq!(stats, PlaybackStats { played: 3, dropped: 0 });
    }
}
