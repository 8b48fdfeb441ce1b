use std::fmt;

use bytes::Bytes;
use serde::Deserialize;

use super::{wav, AudioSpec};

/// How the capture side slices its stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptureMode {
    /// Finalize a complete file per fixed window, then start the next window.
    CompleteFile,
    /// Keep the encoder running and cut slices at a fixed interval.
    StreamingSlice,
}

/// Encoded chunk formats, in the order receivers usually try them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioFormat {
    /// RIFF/WAVE with a 16-bit PCM `fmt ` block. Self-describing.
    Wav,
    /// Headerless 16-bit little-endian PCM. Rate and channels agreed out of band.
    L16,
}

impl AudioFormat {
    pub fn mime(self) -> &'static str {
        match self {
            AudioFormat::Wav => "audio/wav",
            AudioFormat::L16 => "audio/L16",
        }
    }

    /// Whether this format can carry `spec` under `mode`.
    ///
    /// A WAV file needs a finalized header per chunk, so it only fits
    /// complete-file capture.
    pub fn supports(self, mode: CaptureMode, spec: &AudioSpec) -> bool {
        if !spec.is_encodable() {
            return false;
        }
        match self {
            AudioFormat::Wav => mode == CaptureMode::CompleteFile,
            AudioFormat::L16 => true,
        }
    }

    /// Pick the first format in `preferred` that supports `spec` under `mode`.
    pub fn select(preferred: &[AudioFormat], mode: CaptureMode, spec: &AudioSpec) -> Option<Self> {
        preferred.iter().copied().find(|f| f.supports(mode, spec))
    }

    pub fn encode(self, spec: &AudioSpec, samples: &[i16]) -> Bytes {
        match self {
            AudioFormat::Wav => wav::encode(spec, samples),
            AudioFormat::L16 => {
                let mut out = Vec::with_capacity(samples.len() * 2);
                for s in samples {
                    out.extend_from_slice(&s.to_le_bytes());
                }
                Bytes::from(out)
            }
        }
    }
}

impl fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mime())
    }
}
