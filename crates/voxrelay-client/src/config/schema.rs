use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;
use voxrelay_core::audio::{AudioFormat, AudioSpec, CaptureMode};
use voxrelay_core::error::{Result, VoxError};

use crate::capture::EncoderConfig;
use crate::playback::ReassemblerConfig;
use crate::transport::SessionConfig;

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClientConfig {
    pub version: u32,

    #[serde(default)]
    pub relay: RelayLink,

    #[serde(default)]
    pub capture: CaptureSection,

    #[serde(default)]
    pub playback: PlaybackSection,
}

impl ClientConfig {
    pub fn validate(&self) -> Result<()> {
        if self.version != 1 {
            return Err(VoxError::Config(format!(
                "unsupported config version {}",
                self.version
            )));
        }
        self.relay.validate()?;
        self.capture.validate()?;
        self.playback.validate()?;
        Ok(())
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            version: 1,
            relay: RelayLink::default(),
            capture: CaptureSection::default(),
            playback: PlaybackSection::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RelayLink {
    #[serde(default = "default_url")]
    pub url: String,

    #[serde(default = "default_heartbeat_interval_ms")]
    pub heartbeat_interval_ms: u64,

    /// Fixed delay before each reconnect attempt.
    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,

    #[serde(default = "default_queue_depth")]
    pub queue_depth: usize,
}

impl Default for RelayLink {
    fn default() -> Self {
        Self {
            url: default_url(),
            heartbeat_interval_ms: default_heartbeat_interval_ms(),
            reconnect_delay_ms: default_reconnect_delay_ms(),
            queue_depth: default_queue_depth(),
        }
    }
}

impl RelayLink {
    pub fn validate(&self) -> Result<()> {
        if !(self.url.starts_with("ws://") || self.url.starts_with("wss://")) {
            return Err(VoxError::Config(
                "relay.url must start with ws:// or wss://".into(),
            ));
        }
        if !(1000..=300000).contains(&self.heartbeat_interval_ms) {
            return Err(VoxError::Config(
                "relay.heartbeat_interval_ms must be between 1000 and 300000".into(),
            ));
        }
        if !(100..=60000).contains(&self.reconnect_delay_ms) {
            return Err(VoxError::Config(
                "relay.reconnect_delay_ms must be between 100 and 60000".into(),
            ));
        }
        if !(1..=65536).contains(&self.queue_depth) {
            return Err(VoxError::Config(
                "relay.queue_depth must be between 1 and 65536".into(),
            ));
        }
        Ok(())
    }

    pub fn session(&self) -> SessionConfig {
        SessionConfig {
            heartbeat_interval: Duration::from_millis(self.heartbeat_interval_ms),
            reconnect_delay: Duration::from_millis(self.reconnect_delay_ms),
            queue_depth: self.queue_depth,
        }
    }
}

fn default_url() -> String {
    "ws://127.0.0.1:8000/ws".into()
}
fn default_heartbeat_interval_ms() -> u64 {
    30000
}
fn default_reconnect_delay_ms() -> u64 {
    3000
}
fn default_queue_depth() -> usize {
    64
}

/// What feeds the encoder.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SourceSpec {
    Tone {
        #[serde(default = "default_frequency_hz")]
        frequency_hz: f32,
        #[serde(default = "default_sample_rate")]
        sample_rate: u32,
        #[serde(default = "default_channels")]
        channels: u16,
    },
    WavFile {
        path: PathBuf,
    },
}

impl Default for SourceSpec {
    fn default() -> Self {
        SourceSpec::Tone {
            frequency_hz: default_frequency_hz(),
            sample_rate: default_sample_rate(),
            channels: default_channels(),
        }
    }
}

fn default_frequency_hz() -> f32 {
    440.0
}
fn default_sample_rate() -> u32 {
    16000
}
fn default_channels() -> u16 {
    1
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CaptureSection {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_mode")]
    pub mode: CaptureMode,

    #[serde(default = "default_window_ms")]
    pub window_ms: u64,

    #[serde(default = "default_slice_ms")]
    pub slice_ms: u64,

    /// Output formats, most preferred first.
    #[serde(default = "default_formats")]
    pub formats: Vec<AudioFormat>,

    #[serde(default)]
    pub source: SourceSpec,

    /// Hand-off queue between encoder and transport.
    #[serde(default = "default_queue_depth")]
    pub queue_depth: usize,
}

impl Default for CaptureSection {
    fn default() -> Self {
        Self {
            enabled: true,
            mode: default_mode(),
            window_ms: default_window_ms(),
            slice_ms: default_slice_ms(),
            formats: default_formats(),
            source: SourceSpec::default(),
            queue_depth: default_queue_depth(),
        }
    }
}

impl CaptureSection {
    pub fn validate(&self) -> Result<()> {
        if !(20..=60000).contains(&self.window_ms) {
            return Err(VoxError::Config(
                "capture.window_ms must be between 20 and 60000".into(),
            ));
        }
        if !(10..=10000).contains(&self.slice_ms) {
            return Err(VoxError::Config(
                "capture.slice_ms must be between 10 and 10000".into(),
            ));
        }
        if self.formats.is_empty() {
            return Err(VoxError::Config("capture.formats must not be empty".into()));
        }
        if !(1..=65536).contains(&self.queue_depth) {
            return Err(VoxError::Config(
                "capture.queue_depth must be between 1 and 65536".into(),
            ));
        }
        if let SourceSpec::Tone {
            frequency_hz,
            sample_rate,
            channels,
        } = &self.source
        {
            if !frequency_hz.is_finite()
                || *frequency_hz <= 0.0
                || !AudioSpec::new(*sample_rate, *channels).is_encodable()
            {
                return Err(VoxError::Config(
                    "capture.source tone needs a positive frequency, a sample rate, and 1 or 2 channels"
                        .into(),
                ));
            }
        }
        Ok(())
    }

    pub fn encoder(&self) -> EncoderConfig {
        EncoderConfig {
            mode: self.mode,
            window: Duration::from_millis(self.window_ms),
            slice: Duration::from_millis(self.slice_ms),
            formats: self.formats.clone(),
        }
    }
}

fn default_true() -> bool {
    true
}
fn default_mode() -> CaptureMode {
    CaptureMode::CompleteFile
}
fn default_window_ms() -> u64 {
    500
}
fn default_slice_ms() -> u64 {
    100
}
fn default_formats() -> Vec<AudioFormat> {
    vec![AudioFormat::Wav, AudioFormat::L16]
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PlaybackSection {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Decoder strategy order.
    #[serde(default = "default_formats")]
    pub formats: Vec<AudioFormat>,

    #[serde(default)]
    pub known_format: Option<AudioFormat>,

    /// Layout assumed for headerless slices.
    #[serde(default = "default_stream_spec")]
    pub stream: AudioSpec,

    #[serde(default = "default_batch_gap_ms")]
    pub batch_gap_ms: u64,

    /// WAV file to append played audio to. Audio is discarded when absent.
    #[serde(default)]
    pub output: Option<PathBuf>,
}

impl Default for PlaybackSection {
    fn default() -> Self {
        Self {
            enabled: true,
            formats: default_formats(),
            known_format: None,
            stream: default_stream_spec(),
            batch_gap_ms: default_batch_gap_ms(),
            output: None,
        }
    }
}

impl PlaybackSection {
    pub fn validate(&self) -> Result<()> {
        if self.formats.is_empty() && self.known_format.is_none() {
            return Err(VoxError::Config(
                "playback.formats must not be empty".into(),
            ));
        }
        if !self.stream.is_encodable() {
            return Err(VoxError::Config(
                "playback.stream needs a sample rate and 1 or 2 channels".into(),
            ));
        }
        if self.batch_gap_ms > 10000 {
            return Err(VoxError::Config(
                "playback.batch_gap_ms must be at most 10000".into(),
            ));
        }
        Ok(())
    }

    pub fn reassembler(&self) -> ReassemblerConfig {
        ReassemblerConfig {
            formats: self.formats.clone(),
            known_format: self.known_format,
            stream_spec: self.stream,
            batch_gap: Duration::from_millis(self.batch_gap_ms),
        }
    }
}

fn default_stream_spec() -> AudioSpec {
    AudioSpec::new(default_sample_rate(), default_channels())
}
fn default_batch_gap_ms() -> u64 {
    50
}
