//! Audio chunk types, wire formats, and decoder strategies.

mod chunk;
pub mod decoder;
mod format;
pub mod wav;

pub use chunk::{AudioChunk, AudioSpec, PcmBlock};
pub use decoder::{decoders_for, ChunkDecoder, L16Decoder, WavDecoder};
pub use format::{AudioFormat, CaptureMode};
