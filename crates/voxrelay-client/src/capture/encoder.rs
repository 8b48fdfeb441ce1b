use std::time::Duration;

use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use voxrelay_core::audio::{AudioChunk, AudioFormat, AudioSpec, CaptureMode};
use voxrelay_core::error::{Result, VoxError};

use super::CaptureSource;
use crate::event::EventBus;

#[derive(Debug, Clone)]
pub struct EncoderConfig {
    pub mode: CaptureMode,
    /// Window length in complete-file mode.
    pub window: Duration,
    /// Slice interval in streaming-slice mode.
    pub slice: Duration,
    /// Output formats, most preferred first.
    pub formats: Vec<AudioFormat>,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            mode: CaptureMode::CompleteFile,
            window: Duration::from_millis(500),
            slice: Duration::from_millis(100),
            formats: vec![AudioFormat::Wav, AudioFormat::L16],
        }
    }
}

impl EncoderConfig {
    fn period(&self) -> Duration {
        match self.mode {
            CaptureMode::CompleteFile => self.window,
            CaptureMode::StreamingSlice => self.slice,
        }
    }
}

/// One emitted chunk with its position in the capture stream.
#[derive(Debug, Clone)]
pub struct EncodedChunk {
    pub seq: u64,
    /// Stream time of the first sample in this chunk.
    pub captured_at: Duration,
    pub format: AudioFormat,
    pub chunk: AudioChunk,
}

/// Slices a capture stream into self-contained chunks.
pub struct ChunkEncoder {
    source: Box<dyn CaptureSource>,
    spec: AudioSpec,
    format: AudioFormat,
    samples_per_chunk: usize,
    pending: Vec<i16>,
    seq: u64,
    emitted_samples: usize,
    ended: bool,
}

impl ChunkEncoder {
    /// Open `source` and pick an output format.
    ///
    /// Fails with `CaptureUnavailable` when the device cannot be opened and
    /// with `EncodingUnavailable` when no preferred format fits the stream;
    /// the device is released in that case.
    pub async fn open(mut source: Box<dyn CaptureSource>, cfg: &EncoderConfig) -> Result<Self> {
        let spec = source.open().await.map_err(|e| match e {
            VoxError::CaptureUnavailable(_) => e,
            other => VoxError::CaptureUnavailable(other.to_string()),
        })?;

        let Some(format) = AudioFormat::select(&cfg.formats, cfg.mode, &spec) else {
            source.close().await;
            return Err(VoxError::EncodingUnavailable);
        };

        let samples_per_chunk = spec.samples_for(cfg.period()).max(spec.channels as usize);
        tracing::info!(
            format = %format,
            mode = ?cfg.mode,
            sample_rate = spec.sample_rate,
            channels = spec.channels,
            "capture opened"
        );

        Ok(Self {
            source,
            spec,
            format,
            samples_per_chunk,
            pending: Vec::with_capacity(samples_per_chunk * 2),
            seq: 0,
            emitted_samples: 0,
            ended: false,
        })
    }

    pub fn spec(&self) -> AudioSpec {
        self.spec
    }

    pub fn format(&self) -> AudioFormat {
        self.format
    }

    /// Next chunk, or `None` once the source has ended and everything
    /// buffered has been emitted. Cancel-safe as long as the source is.
    pub async fn next_chunk(&mut self) -> Result<Option<EncodedChunk>> {
        while !self.ended && self.pending.len() < self.samples_per_chunk {
            match self.source.read().await? {
                Some(block) => self.pending.extend_from_slice(&block),
                None => self.ended = true,
            }
        }

        let take = self.samples_per_chunk.min(self.pending.len());
        // whole frames only
        let take = take - take % self.spec.channels as usize;
        if take == 0 {
            return Ok(None);
        }

        let window: Vec<i16> = self.pending.drain(..take).collect();
        let chunk = EncodedChunk {
            seq: self.seq,
            captured_at: self.spec.duration_of(self.emitted_samples),
            format: self.format,
            chunk: AudioChunk::new(self.format.encode(&self.spec, &window)),
        };
        self.seq += 1;
        self.emitted_samples += take;
        Ok(Some(chunk))
    }

    pub async fn close(&mut self) {
        self.source.close().await;
        self.pending.clear();
    }
}

/// Running capture task.
pub struct CaptureHandle {
    stop: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
    format: AudioFormat,
    spec: AudioSpec,
}

impl CaptureHandle {
    pub fn format(&self) -> AudioFormat {
        self.format
    }

    pub fn spec(&self) -> AudioSpec {
        self.spec
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Halt chunk production now and release the device. Chunks already
    /// handed off keep travelling.
    pub async fn stop(mut self) {
        if let Some(tx) = self.stop.take() {
            let _ = tx.send(());
        }
        let _ = self.task.await;
    }
}

/// Open the source and start emitting chunks into `out`.
///
/// Fatal conditions (`CaptureUnavailable`, `EncodingUnavailable`) are returned
/// here, before any task starts. A source failure after that ends capture and
/// is published on `events` as `CaptureUnavailable`. Hand-off never blocks
/// capture: when `out` is full the chunk is dropped.
pub async fn start_capture(
    source: Box<dyn CaptureSource>,
    cfg: &EncoderConfig,
    out: mpsc::Sender<EncodedChunk>,
    events: EventBus,
) -> Result<CaptureHandle> {
    let mut encoder = ChunkEncoder::open(source, cfg).await?;
    let format = encoder.format();
    let spec = encoder.spec();
    let (stop_tx, mut stop_rx) = oneshot::channel::<()>();

    let task = tokio::spawn(async move {
        loop {
            tokio::select! {
                biased;
                _ = &mut stop_rx => break,
                next = encoder.next_chunk() => match next {
                    Ok(Some(c)) => {
                        let seq = c.seq;
                        match out.try_send(c) {
                            Ok(()) => tracing::trace!(seq, "chunk emitted"),
                            Err(TrySendError::Full(_)) => {
                                tracing::warn!(seq, "transport backlog, chunk dropped");
                            }
                            Err(TrySendError::Closed(_)) => break,
                        }
                    }
                    Ok(None) => {
                        tracing::info!("capture stream ended");
                        break;
                    }
                    Err(e) => {
                        let err = match e {
                            VoxError::CaptureUnavailable(_) => e,
                            other => VoxError::CaptureUnavailable(other.to_string()),
                        };
                        tracing::error!(error = %err, "capture failed");
                        events.error(&err);
                        break;
                    }
                },
            }
        }
        encoder.close().await;
        tracing::info!("capture stopped");
    });

    Ok(CaptureHandle {
        stop: Some(stop_tx),
        task,
        format,
        spec,
    })
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    use async_trait::async_trait;
    use voxrelay_core::audio::{decoders_for, wav};

    use super::*;
    use crate::event::ClientEvent;

    /// Emits ascending samples in fixed blocks, `blocks` times.
    struct Counter {
        spec: AudioSpec,
        block: usize,
        blocks: usize,
        next: i16,
        fail_open: bool,
        /// Blocks delivered before `read` starts failing.
        fail_after: Option<usize>,
        closed: Arc<AtomicBool>,
    }

    impl Counter {
        fn new(spec: AudioSpec, block: usize, blocks: usize) -> Self {
            Self {
                spec,
                block,
                blocks,
                next: 0,
                fail_open: false,
                fail_after: None,
                closed: Arc::new(AtomicBool::new(false)),
            }
        }
    }

    #[async_trait]
    impl CaptureSource for Counter {
        async fn open(&mut self) -> Result<AudioSpec> {
            if self.fail_open {
                return Err(VoxError::CaptureUnavailable("permission denied".into()));
            }
            Ok(self.spec)
        }

        async fn read(&mut self) -> Result<Option<Vec<i16>>> {
            if self.fail_after == Some(0) {
                return Err(VoxError::Internal("device disconnected".into()));
            }
            if let Some(n) = self.fail_after.as_mut() {
                *n -= 1;
            }
            if self.blocks == 0 {
                return Ok(None);
            }
            self.blocks -= 1;
            tokio::time::sleep(Duration::from_millis(10)).await;
            let out = (0..self.block)
                .map(|_| {
                    self.next = self.next.wrapping_add(1);
                    self.next
                })
                .collect();
            Ok(Some(out))
        }

        async fn close(&mut self) {
            self.closed.store(true, Ordering::SeqCst);
        }
    }

    fn cfg(mode: CaptureMode, formats: Vec<AudioFormat>) -> EncoderConfig {
        EncoderConfig {
            mode,
            window: Duration::from_millis(500),
            slice: Duration::from_millis(100),
            formats,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn complete_file_chunks_decode_in_isolation() {
        let spec = AudioSpec::new(1_000, 1);
        // 1200 samples = 2 full 500 ms windows + a 200 ms tail
        let src = Counter::new(spec, 100, 12);
        let mut enc = ChunkEncoder::open(Box::new(src), &EncoderConfig::default())
            .await
            .unwrap();
        assert_eq!(enc.format(), AudioFormat::Wav);

        let mut chunks = Vec::new();
        while let Some(c) = enc.next_chunk().await.unwrap() {
            chunks.push(c);
        }
        assert_eq!(chunks.len(), 3);
        assert_eq!(
            chunks.iter().map(|c| c.captured_at).collect::<Vec<_>>(),
            vec![
                Duration::ZERO,
                Duration::from_millis(500),
                Duration::from_millis(1000)
            ]
        );

        // any chunk alone is a whole file
        let second = wav::decode(chunks[1].chunk.clone().into_bytes()).unwrap();
        assert_eq!(second.samples.len(), 500);
        assert_eq!(second.samples[0], 501);
        let tail = wav::decode(chunks[2].chunk.clone().into_bytes()).unwrap();
        assert_eq!(tail.samples.len(), 200);
    }

    #[tokio::test(start_paused = true)]
    async fn streaming_slices_are_l16() {
        let spec = AudioSpec::new(1_000, 1);
        let src = Counter::new(spec, 50, 4);
        let mut enc = ChunkEncoder::open(
            Box::new(src),
            &cfg(CaptureMode::StreamingSlice, vec![AudioFormat::Wav, AudioFormat::L16]),
        )
        .await
        .unwrap();
        assert_eq!(enc.format(), AudioFormat::L16);

        let decoders = decoders_for(&[AudioFormat::L16], spec);
        let mut seqs = Vec::new();
        while let Some(c) = enc.next_chunk().await.unwrap() {
            let pcm = decoders[0].try_decode(&c.chunk).unwrap();
            assert_eq!(pcm.samples.len(), 100);
            seqs.push(c.seq);
        }
        assert_eq!(seqs, vec![0, 1]);
    }

    #[tokio::test]
    async fn no_supported_format_is_reported_and_releases_device() {
        let spec = AudioSpec::new(16_000, 1);
        let src = Counter::new(spec, 10, 1);
        let closed = Arc::clone(&src.closed);
        let err = ChunkEncoder::open(
            Box::new(src),
            &cfg(CaptureMode::StreamingSlice, vec![AudioFormat::Wav]),
        )
        .await
        .err()
        .unwrap();
        assert_eq!(err, VoxError::EncodingUnavailable);
        assert!(err.is_fatal());
        assert!(closed.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn denied_device_is_capture_unavailable() {
        let mut src = Counter::new(AudioSpec::new(16_000, 1), 10, 1);
        src.fail_open = true;
        let (tx, _rx) = mpsc::channel(4);
        let err = start_capture(Box::new(src), &EncoderConfig::default(), tx, EventBus::default())
            .await
            .err()
            .unwrap();
        assert_eq!(err.code(), voxrelay_core::ErrorCode::CaptureUnavailable);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_halts_production_and_closes_source() {
        let spec = AudioSpec::new(1_000, 1);
        let src = Counter::new(spec, 100, 10_000);
        let closed = Arc::clone(&src.closed);
        let (tx, mut rx) = mpsc::channel(64);
        let handle = start_capture(Box::new(src), &EncoderConfig::default(), tx, EventBus::default())
            .await
            .unwrap();

        let first = rx.recv().await.unwrap();
        assert_eq!(first.seq, 0);

        handle.stop().await;
        assert!(closed.load(Ordering::SeqCst));

        // drain what was already handed off, then nothing more arrives
        while rx.try_recv().is_ok() {}
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn full_queue_drops_instead_of_blocking() {
        let spec = AudioSpec::new(1_000, 1);
        let src = Counter::new(spec, 500, 5);
        let (tx, mut rx) = mpsc::channel(1);
        let handle = start_capture(Box::new(src), &EncoderConfig::default(), tx, EventBus::default())
            .await
            .unwrap();

        // nobody reads while the source runs dry
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(handle.is_finished());
        let mut got = Vec::new();
        while let Some(c) = rx.recv().await {
            got.push(c.seq);
        }
        assert_eq!(got, vec![0]);
    }

    #[tokio::test(start_paused = true)]
    async fn read_failure_after_start_is_published() {
        let spec = AudioSpec::new(1_000, 1);
        let mut src = Counter::new(spec, 100, 100);
        src.fail_after = Some(7);
        let closed = Arc::clone(&src.closed);
        let events = EventBus::default();
        let mut sub = events.subscribe();
        let (tx, mut rx) = mpsc::channel(8);
        let handle = start_capture(Box::new(src), &EncoderConfig::default(), tx, events)
            .await
            .unwrap();

        // one full window gets out before the device goes away
        assert_eq!(rx.recv().await.unwrap().seq, 0);
        assert!(rx.recv().await.is_none());

        match sub.recv().await.unwrap() {
            ClientEvent::Error { code, message } => {
                assert_eq!(code, voxrelay_core::ErrorCode::CaptureUnavailable);
                assert!(message.contains("device disconnected"));
            }
            other => panic!("unexpected event {other:?}"),
        }
        handle.stop().await;
        assert!(closed.load(Ordering::SeqCst));
    }
}
