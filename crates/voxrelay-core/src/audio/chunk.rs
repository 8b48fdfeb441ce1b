use std::time::Duration;

use bytes::Bytes;
use serde::Deserialize;

/// Opaque encoded audio, the atomic unit of transport.
///
/// Backed by `Bytes`; hand-off between pipeline stages moves the value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioChunk(Bytes);

impl AudioChunk {
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self(data.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_bytes(self) -> Bytes {
        self.0
    }
}

/// Raw stream parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AudioSpec {
    pub sample_rate: u32,
    pub channels: u16,
}

impl AudioSpec {
    pub fn new(sample_rate: u32, channels: u16) -> Self {
        Self { sample_rate, channels }
    }

    /// Interleaved sample count covering `window`.
    pub fn samples_for(&self, window: Duration) -> usize {
        let frames = (self.sample_rate as u128 * window.as_millis()) / 1000;
        frames as usize * self.channels as usize
    }

    /// Playing time of `samples` interleaved samples.
    pub fn duration_of(&self, samples: usize) -> Duration {
        if self.sample_rate == 0 || self.channels == 0 {
            return Duration::ZERO;
        }
        let frames = samples as u64 / self.channels as u64;
        Duration::from_micros(frames * 1_000_000 / self.sample_rate as u64)
    }

    /// Rate and channel layout both encoders can represent.
    pub fn is_encodable(&self) -> bool {
        self.sample_rate > 0 && (1..=2).contains(&self.channels)
    }
}

/// Decoded, playable PCM (16-bit interleaved).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PcmBlock {
    pub spec: AudioSpec,
    pub samples: Vec<i16>,
}

impl PcmBlock {
    pub fn duration(&self) -> Duration {
        self.spec.duration_of(self.samples.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_sizing() {
        let spec = AudioSpec::new(16_000, 1);
        assert_eq!(spec.samples_for(Duration::from_millis(100)), 1600);
        let stereo = AudioSpec::new(48_000, 2);
        assert_eq!(stereo.samples_for(Duration::from_millis(500)), 48_000);
        assert_eq!(stereo.duration_of(48_000), Duration::from_millis(500));
    }

    #[test]
    fn encodable_layouts() {
        assert!(AudioSpec::new(8_000, 1).is_encodable());
        assert!(!AudioSpec::new(0, 1).is_encodable());
        assert!(!AudioSpec::new(48_000, 6).is_encodable());
    }
}
