//! Client transport: the connection seam and the session that drives it.

mod link;
pub mod memory;
mod session;

pub use link::{Connector, Link, TextSink, TextStream, WsConnector};
pub use session::{SessionConfig, SessionSender, TransportSession};
