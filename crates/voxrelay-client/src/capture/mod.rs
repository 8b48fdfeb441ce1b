//! Capture side: sources of raw PCM and the chunk encoder that slices them.

mod encoder;
mod source;

pub use encoder::{start_capture, CaptureHandle, ChunkEncoder, EncodedChunk, EncoderConfig};
pub use source::{CaptureSource, ToneSource, WavFileSource};
