//! Wire protocol.
//!
//! Every message on the duplex connection is one JSON text frame carrying an
//! envelope tagged by `type`. Binary chunk payloads are base64 inside the JSON
//! so the connection can stay text-framed end to end.
//!
//! The parser is panic-free: malformed input is reported as
//! `VoxError::MalformedEnvelope` and the frame is discarded as a whole.

pub mod envelope;

pub use envelope::{decode, encode, Envelope, EnvelopeKind};
