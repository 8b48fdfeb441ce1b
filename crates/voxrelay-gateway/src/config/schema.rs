use std::net::SocketAddr;
use std::time::Duration;

use serde::Deserialize;
use voxrelay_core::error::{Result, VoxError};

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GatewayConfig {
    pub version: u32,

    #[serde(default)]
    pub gateway: GatewaySection,

    #[serde(default)]
    pub relay: RelaySection,
}

impl GatewayConfig {
    pub fn validate(&self) -> Result<()> {
        if self.version != 1 {
            return Err(VoxError::Config(format!(
                "unsupported config version {}",
                self.version
            )));
        }
        self.gateway.validate()?;
        self.relay.validate()?;
        Ok(())
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            version: 1,
            gateway: GatewaySection::default(),
            relay: RelaySection::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GatewaySection {
    #[serde(default = "default_listen")]
    pub listen: String,

    /// Per-session outbound queue; a full queue drops frames for that peer only.
    #[serde(default = "default_queue_depth")]
    pub queue_depth: usize,

    /// Protocol-level WebSocket ping cadence.
    #[serde(default = "default_ping_interval_ms")]
    pub ping_interval_ms: u64,

    /// Close sessions silent for this long. Disabled when absent.
    #[serde(default)]
    pub idle_timeout_ms: Option<u64>,
}

impl Default for GatewaySection {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            queue_depth: default_queue_depth(),
            ping_interval_ms: default_ping_interval_ms(),
            idle_timeout_ms: None,
        }
    }
}

impl GatewaySection {
    pub fn validate(&self) -> Result<()> {
        self.listen_addr()?;
        if !(1..=65536).contains(&self.queue_depth) {
            return Err(VoxError::Config(
                "gateway.queue_depth must be between 1 and 65536".into(),
            ));
        }
        if !(1000..=120000).contains(&self.ping_interval_ms) {
            return Err(VoxError::Config(
                "gateway.ping_interval_ms must be between 1000 and 120000".into(),
            ));
        }
        if let Some(idle) = self.idle_timeout_ms {
            if idle <= self.ping_interval_ms || idle > 600000 {
                return Err(VoxError::Config(
                    "gateway.idle_timeout_ms must be greater than ping_interval_ms and at most 600000"
                        .into(),
                ));
            }
        }
        Ok(())
    }

    pub fn listen_addr(&self) -> Result<SocketAddr> {
        self.listen
            .parse()
            .map_err(|e| VoxError::Config(format!("gateway.listen is not a socket address: {e}")))
    }

    pub fn ping_interval(&self) -> Duration {
        Duration::from_millis(self.ping_interval_ms)
    }

    pub fn idle_timeout(&self) -> Option<Duration> {
        self.idle_timeout_ms.map(Duration::from_millis)
    }
}

fn default_listen() -> String {
    "0.0.0.0:8000".into()
}
fn default_queue_depth() -> usize {
    256
}
fn default_ping_interval_ms() -> u64 {
    20000
}

/// Where an inbound audio envelope goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BroadcastPolicy {
    /// Every open session except the sender.
    #[default]
    FanOut,
    /// Back to the sender only.
    Echo,
    /// Record for a window, then replay the batch to everyone.
    Replay,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RelaySection {
    #[serde(default)]
    pub policy: BroadcastPolicy,

    #[serde(default)]
    pub replay: ReplaySection,
}

impl RelaySection {
    pub fn validate(&self) -> Result<()> {
        self.replay.validate()
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReplaySection {
    #[serde(default = "default_window_ms")]
    pub record_ms: u64,
    #[serde(default = "default_window_ms")]
    pub playback_ms: u64,
}

impl Default for ReplaySection {
    fn default() -> Self {
        Self {
            record_ms: default_window_ms(),
            playback_ms: default_window_ms(),
        }
    }
}

impl ReplaySection {
    pub fn validate(&self) -> Result<()> {
        for (name, v) in [("record_ms", self.record_ms), ("playback_ms", self.playback_ms)] {
            if !(100..=600000).contains(&v) {
                return Err(VoxError::Config(format!(
                    "relay.replay.{name} must be between 100 and 600000"
                )));
            }
        }
        Ok(())
    }
}

fn default_window_ms() -> u64 {
    5000
}
