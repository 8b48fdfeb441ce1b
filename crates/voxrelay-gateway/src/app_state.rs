//! Shared application state for the relay server.

use std::sync::Arc;

use crate::config::GatewayConfig;
use crate::relay::{self, RelayHandle};

const HUB_QUEUE_DEPTH: usize = 4096;

#[derive(Clone)]
pub struct AppState {
    cfg: Arc<GatewayConfig>,
    relay: RelayHandle,
}

impl AppState {
    /// Build application state and start the relay hub.
    /// Must be called inside a tokio runtime.
    pub fn new(cfg: GatewayConfig) -> Self {
        let relay = relay::spawn(&cfg.relay, HUB_QUEUE_DEPTH);
        Self {
            cfg: Arc::new(cfg),
            relay,
        }
    }

    pub fn cfg(&self) -> &GatewayConfig {
        &self.cfg
    }

    pub fn relay(&self) -> RelayHandle {
        self.relay.clone()
    }
}
