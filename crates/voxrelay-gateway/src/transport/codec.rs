//! Decode-once codec for the transport layer.
//!
//! - Text frames => `Envelope` (the frame text is kept for verbatim forwarding)
//! - Binary frames are not envelopes and are rejected
//! - Ping/Pong/Close are surfaced for lifecycle management

use axum::extract::ws::Message;
use voxrelay_core::{
    error::{Result, VoxError},
    protocol::{self, Envelope},
};

#[derive(Debug)]
pub enum Inbound {
    Envelope { env: Envelope, frame: String },
    Ping(Vec<u8>),
    Pong(Vec<u8>),
    Close,
}

pub fn decode(msg: Message) -> Result<Inbound> {
    match msg {
        Message::Text(s) => {
            let env = protocol::decode(&s)?;
            Ok(Inbound::Envelope { env, frame: s })
        }
        Message::Binary(b) => Err(VoxError::MalformedEnvelope(format!(
            "binary frame of {} bytes is not an envelope",
            b.len()
        ))),
        Message::Ping(v) => Ok(Inbound::Ping(v)),
        Message::Pong(v) => Ok(Inbound::Pong(v)),
        Message::Close(_) => Ok(Inbound::Close),
    }
}
