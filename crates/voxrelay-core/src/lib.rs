//! voxrelay core: transport-agnostic protocol primitives, audio formats, and errors.
//!
//! This crate defines the wire envelope, the chunk types that travel inside it,
//! and the encode/decode strategies for the audio formats the relay carries.
//! It carries no transport or runtime dependencies so the relay server and the
//! client pipeline can share it.
//!
//! # Defensive guarantees
//! Panics, `unwrap`, and `expect` are compile-denied here.
//! Malformed envelopes and undecodable chunks surface as `VoxError` values so a
//! single bad message can never take down a session or the process.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod audio;
pub mod error;
pub mod protocol;
pub mod session;

/// Shared result type.
pub use error::{ErrorCode, Result, VoxError};
pub use session::SessionState;
