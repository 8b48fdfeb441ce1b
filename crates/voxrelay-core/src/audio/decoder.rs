//! Capability-checked decoder strategies.
//!
//! A receiver holds an ordered list of strategies and tries them in turn; the
//! first one that yields playable PCM wins.

use super::{wav, AudioChunk, AudioFormat, AudioSpec, PcmBlock};
use crate::error::{Result, VoxError};

/// Uniform decode contract.
pub trait ChunkDecoder: Send + Sync {
    fn format(&self) -> AudioFormat;
    fn try_decode(&self, chunk: &AudioChunk) -> Result<PcmBlock>;
}

/// Self-describing WAV files.
#[derive(Debug, Default, Clone, Copy)]
pub struct WavDecoder;

impl ChunkDecoder for WavDecoder {
    fn format(&self) -> AudioFormat {
        AudioFormat::Wav
    }

    fn try_decode(&self, chunk: &AudioChunk) -> Result<PcmBlock> {
        wav::decode(chunk.clone().into_bytes())
    }
}

/// Headerless L16 slices with an agreed stream spec.
#[derive(Debug, Clone, Copy)]
pub struct L16Decoder {
    spec: AudioSpec,
}

impl L16Decoder {
    pub fn new(spec: AudioSpec) -> Self {
        Self { spec }
    }
}

impl ChunkDecoder for L16Decoder {
    fn format(&self) -> AudioFormat {
        AudioFormat::L16
    }

    fn try_decode(&self, chunk: &AudioChunk) -> Result<PcmBlock> {
        let bytes = chunk.as_bytes();
        let frame_bytes = 2 * self.spec.channels as usize;
        if !self.spec.is_encodable() {
            return Err(VoxError::DecodeFailed("l16: unusable stream spec".into()));
        }
        if bytes.is_empty() || bytes.len() % frame_bytes != 0 {
            return Err(VoxError::DecodeFailed(format!(
                "l16: {} bytes is not a whole number of frames",
                bytes.len()
            )));
        }
        if is_wav_container(bytes) {
            return Err(VoxError::DecodeFailed(
                "l16: payload is a WAV container, not raw samples".into(),
            ));
        }
        let samples = bytes
            .chunks_exact(2)
            .map(|b| i16::from_le_bytes([b[0], b[1]]))
            .collect();
        Ok(PcmBlock {
            spec: self.spec,
            samples,
        })
    }
}

fn is_wav_container(bytes: &[u8]) -> bool {
    bytes.starts_with(b"RIFF") && bytes.get(8..12) == Some(&b"WAVE"[..])
}

/// Build the strategy list for `formats`, preserving order.
///
/// `spec` is the out-of-band stream description headerless formats need.
pub fn decoders_for(formats: &[AudioFormat], spec: AudioSpec) -> Vec<Box<dyn ChunkDecoder>> {
    let mut out: Vec<Box<dyn ChunkDecoder>> = Vec::with_capacity(formats.len());
    for f in formats {
        if out.iter().any(|d| d.format() == *f) {
            continue;
        }
        match f {
            AudioFormat::Wav => out.push(Box::new(WavDecoder)),
            AudioFormat::L16 => out.push(Box::new(L16Decoder::new(spec))),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn l16_rejects_partial_frames() {
        let d = L16Decoder::new(AudioSpec::new(16_000, 2));
        assert!(d.try_decode(&AudioChunk::new(vec![0u8; 6])).is_err());
        assert!(d.try_decode(&AudioChunk::new(Vec::<u8>::new())).is_err());
        let ok = d.try_decode(&AudioChunk::new(vec![0u8; 8])).unwrap();
        assert_eq!(ok.samples.len(), 4);
    }

    #[test]
    fn l16_refuses_wav_files() {
        let spec = AudioSpec::new(16_000, 1);
        let file = AudioFormat::Wav.encode(&AudioSpec::new(8_000, 1), &[7, 7]);
        let err = L16Decoder::new(spec).try_decode(&AudioChunk::new(file)).unwrap_err();
        assert_eq!(err.code(), crate::error::ErrorCode::DecodeFailed);
    }

    #[test]
    fn strategy_list_keeps_order_and_dedups() {
        let spec = AudioSpec::new(16_000, 1);
        let list = decoders_for(&[AudioFormat::L16, AudioFormat::Wav, AudioFormat::L16], spec);
        let formats: Vec<_> = list.iter().map(|d| d.format()).collect();
        assert_eq!(formats, vec![AudioFormat::L16, AudioFormat::Wav]);
    }

    #[test]
    fn wav_decoder_rejects_raw_pcm() {
        let raw = AudioFormat::L16.encode(&AudioSpec::new(16_000, 1), &[1, 2, 3]);
        assert!(WavDecoder.try_decode(&AudioChunk::new(raw)).is_err());
    }
}
