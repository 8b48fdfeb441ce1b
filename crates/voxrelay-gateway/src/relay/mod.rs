//! Relay runtime: session registry, broadcast policies, and the hub task that
//! owns both.
//!
//! Every registry mutation and every broadcast iteration happens inside the
//! hub task, so a broadcast never sees a half-modified session set. Per-session
//! transport tasks talk to the hub only through `RelayHandle`.

mod hub;
mod registry;
mod replay;

pub use hub::{spawn, HubCommand, RelayHandle, RelayHub};
pub use registry::{Connection, SessionId, SessionRecord, SessionRegistry};
pub use replay::{Phase, ReplayCycle};
