//! voxrelay client pipeline.
//!
//! Capture, transport, and playback run as independent tasks joined by
//! bounded channels:
//!
//! capture source -> chunk encoder -> transport session -> relay
//! relay -> transport session -> playback reassembler -> sink
//!
//! Lifecycle and per-chunk progress are published on an [`event::EventBus`]
//! for whatever UI sits on top.

pub mod capture;
pub mod config;
pub mod event;
pub mod pipeline;
pub mod playback;
pub mod transport;

pub use pipeline::Client;
