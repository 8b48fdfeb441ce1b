//! voxrelay gateway library entry.
//!
//! This crate wires the WebSocket transport, the relay hub, and the broadcast
//! policies into the relay server. It is consumed by the binary (`main.rs`)
//! and by integration tests.

pub mod app_state;
pub mod config;
pub mod ops;
pub mod relay;
pub mod router;
pub mod transport;
