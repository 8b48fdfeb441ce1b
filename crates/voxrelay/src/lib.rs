//! Top-level facade crate for voxrelay.
//!
//! Re-exports the core protocol, the relay server library, and the client
//! pipeline so users can depend on a single crate.

pub mod core {
    pub use voxrelay_core::*;
}

pub mod gateway {
    pub use voxrelay_gateway::*;
}

pub mod client {
    pub use voxrelay_client::*;
}
