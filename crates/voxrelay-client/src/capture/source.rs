use std::f32::consts::TAU;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::time::{Interval, MissedTickBehavior};

use voxrelay_core::audio::{wav, AudioSpec};
use voxrelay_core::error::{Result, VoxError};

/// Default capture block: 20 ms of audio per `read`.
const BLOCK: Duration = Duration::from_millis(20);

/// A live PCM source (microphone stand-in).
///
/// `read` must be cancel-safe: the encoder races it against stop requests.
#[async_trait]
pub trait CaptureSource: Send {
    /// Acquire the device. Failure maps to `CaptureUnavailable`.
    async fn open(&mut self) -> Result<AudioSpec>;
    /// Next block of interleaved samples; `None` once the stream has ended.
    async fn read(&mut self) -> Result<Option<Vec<i16>>>;
    /// Release the device.
    async fn close(&mut self);
}

fn pacer() -> Interval {
    let mut iv = tokio::time::interval(BLOCK);
    iv.set_missed_tick_behavior(MissedTickBehavior::Delay);
    iv
}

/// Sine generator paced at real time.
pub struct ToneSource {
    frequency_hz: f32,
    spec: AudioSpec,
    phase: f32,
    pace: Option<Interval>,
}

impl ToneSource {
    pub fn new(frequency_hz: f32, spec: AudioSpec) -> Self {
        Self {
            frequency_hz,
            spec,
            phase: 0.0,
            pace: None,
        }
    }
}

#[async_trait]
impl CaptureSource for ToneSource {
    async fn open(&mut self) -> Result<AudioSpec> {
        if self.spec.sample_rate == 0 || self.spec.channels == 0 {
            return Err(VoxError::CaptureUnavailable(
                "tone source needs a sample rate and at least one channel".into(),
            ));
        }
        self.pace = Some(pacer());
        Ok(self.spec)
    }

    async fn read(&mut self) -> Result<Option<Vec<i16>>> {
        let Some(pace) = self.pace.as_mut() else {
            return Err(VoxError::CaptureUnavailable("source is closed".into()));
        };
        pace.tick().await;

        let channels = self.spec.channels as usize;
        let frames = self.spec.samples_for(BLOCK) / channels;
        let step = TAU * self.frequency_hz / self.spec.sample_rate as f32;
        let mut out = Vec::with_capacity(frames * channels);
        for _ in 0..frames {
            let v = (self.phase.sin() * 0.3 * i16::MAX as f32) as i16;
            out.extend(std::iter::repeat(v).take(channels));
            self.phase = (self.phase + step) % TAU;
        }
        Ok(Some(out))
    }

    async fn close(&mut self) {
        self.pace = None;
    }
}

/// Replays a 16-bit PCM WAV file at real time.
pub struct WavFileSource {
    path: PathBuf,
    samples: Vec<i16>,
    pos: usize,
    block: usize,
    pace: Option<Interval>,
}

impl WavFileSource {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            samples: Vec::new(),
            pos: 0,
            block: 0,
            pace: None,
        }
    }
}

#[async_trait]
impl CaptureSource for WavFileSource {
    async fn open(&mut self) -> Result<AudioSpec> {
        let raw = tokio::fs::read(&self.path).await.map_err(|e| {
            VoxError::CaptureUnavailable(format!("open {}: {e}", self.path.display()))
        })?;
        let block = wav::decode(Bytes::from(raw)).map_err(|e| {
            VoxError::CaptureUnavailable(format!("{}: {e}", self.path.display()))
        })?;
        self.block = block.spec.samples_for(BLOCK).max(block.spec.channels as usize);
        self.samples = block.samples;
        self.pos = 0;
        self.pace = Some(pacer());
        Ok(block.spec)
    }

    async fn read(&mut self) -> Result<Option<Vec<i16>>> {
        let Some(pace) = self.pace.as_mut() else {
            return Err(VoxError::CaptureUnavailable("source is closed".into()));
        };
        if self.pos >= self.samples.len() {
            return Ok(None);
        }
        pace.tick().await;
        let end = (self.pos + self.block).min(self.samples.len());
        let out = self.samples[self.pos..end].to_vec();
        self.pos = end;
        Ok(Some(out))
    }

    async fn close(&mut self) {
        self.pace = None;
        self.samples = Vec::new();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn tone_blocks_are_twenty_ms() {
        let mut src = ToneSource::new(440.0, AudioSpec::new(16_000, 2));
        let spec = src.open().await.unwrap();
        let block = src.read().await.unwrap().unwrap();
        assert_eq!(block.len(), spec.samples_for(BLOCK));
        // stereo frames carry the same value on both channels
        assert_eq!(block[2], block[3]);
        src.close().await;
        assert!(src.read().await.is_err());
    }

    #[tokio::test]
    async fn missing_file_is_capture_unavailable() {
        let mut src = WavFileSource::new("/definitely/not/here.wav");
        let err = src.open().await.unwrap_err();
        assert_eq!(err.code(), voxrelay_core::ErrorCode::CaptureUnavailable);
    }

    #[tokio::test(start_paused = true)]
    async fn wav_file_plays_to_the_end() {
        let spec = AudioSpec::new(8_000, 1);
        let samples: Vec<i16> = (0..400).collect();
        let path = std::env::temp_dir().join(format!("voxrelay-src-{}.wav", std::process::id()));
        std::fs::write(&path, wav::encode(&spec, &samples)).unwrap();

        let mut src = WavFileSource::new(&path);
        assert_eq!(src.open().await.unwrap(), spec);
        let mut got = Vec::new();
        while let Some(block) = src.read().await.unwrap() {
            got.extend(block);
        }
        assert_eq!(got, samples);
        let _ = std::fs::remove_file(&path);
    }
}
