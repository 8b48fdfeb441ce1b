//! Envelope codec (JSON text frames).

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};

use crate::audio::AudioChunk;
use crate::error::{Result, VoxError};

/// Envelope kind, as carried in the `type` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EnvelopeKind {
    Audio,
    Playback,
    Ping,
    Pong,
}

impl EnvelopeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EnvelopeKind::Audio => "audio",
            EnvelopeKind::Playback => "playback",
            EnvelopeKind::Ping => "ping",
            EnvelopeKind::Pong => "pong",
        }
    }
}

/// Decoded envelope. The only unit that crosses the transport boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Envelope {
    /// One chunk of encoded audio.
    Audio(AudioChunk),
    /// Ordered batch of recorded chunks, replayed by the receiver in order.
    Playback(Vec<AudioChunk>),
    Ping,
    Pong,
}

impl Envelope {
    pub fn kind(&self) -> EnvelopeKind {
        match self {
            Envelope::Audio(_) => EnvelopeKind::Audio,
            Envelope::Playback(_) => EnvelopeKind::Playback,
            Envelope::Ping => EnvelopeKind::Ping,
            Envelope::Pong => EnvelopeKind::Pong,
        }
    }

    /// Total chunk payload bytes carried (0 for control envelopes).
    pub fn payload_len(&self) -> usize {
        match self {
            Envelope::Audio(c) => c.len(),
            Envelope::Playback(cs) => cs.iter().map(AudioChunk::len).sum(),
            Envelope::Ping | Envelope::Pong => 0,
        }
    }
}

/// Wire shape. Unknown extra fields are ignored; `type` is mandatory.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum WireEnvelope {
    Audio { data: String },
    Playback { chunks: Vec<String> },
    Ping,
    Pong,
}

/// Encode an envelope into one JSON text frame.
pub fn encode(env: &Envelope) -> Result<String> {
    let wire = match env {
        Envelope::Audio(chunk) => WireEnvelope::Audio {
            data: STANDARD.encode(chunk.as_bytes()),
        },
        Envelope::Playback(chunks) => WireEnvelope::Playback {
            chunks: chunks.iter().map(|c| STANDARD.encode(c.as_bytes())).collect(),
        },
        Envelope::Ping => WireEnvelope::Ping,
        Envelope::Pong => WireEnvelope::Pong,
    };
    serde_json::to_string(&wire)
        .map_err(|e| VoxError::Internal(format!("envelope encode failed: {e}")))
}

/// Decode one JSON text frame. Fails as a whole on any malformed part.
pub fn decode(text: &str) -> Result<Envelope> {
    let wire: WireEnvelope = serde_json::from_str(text)
        .map_err(|e| VoxError::MalformedEnvelope(format!("invalid envelope json: {e}")))?;

    match wire {
        WireEnvelope::Audio { data } => Ok(Envelope::Audio(decode_chunk(&data)?)),
        WireEnvelope::Playback { chunks } => {
            let chunks = chunks
                .iter()
                .map(|c| decode_chunk(c))
                .collect::<Result<Vec<_>>>()?;
            Ok(Envelope::Playback(chunks))
        }
        WireEnvelope::Ping => Ok(Envelope::Ping),
        WireEnvelope::Pong => Ok(Envelope::Pong),
    }
}

fn decode_chunk(data: &str) -> Result<AudioChunk> {
    STANDARD
        .decode(data)
        .map(AudioChunk::new)
        .map_err(|e| VoxError::MalformedEnvelope(format!("invalid base64 payload: {e}")))
}
