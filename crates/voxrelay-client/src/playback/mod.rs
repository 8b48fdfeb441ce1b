//! Receive side: decode strategies, sequencing, and sinks.

mod reassembler;
mod sink;

pub use reassembler::{PlaybackStats, Reassembler, ReassemblerConfig};
pub use sink::{DiscardSink, PlaybackSink, WavFileSink};
