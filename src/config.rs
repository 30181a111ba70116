use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use serde::Deserialize;

use crate::session::SessionConfig;
use crate::transport::AudioWireEncoding;

#[derive(Debug, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub audio: AudioConfig,
    #[serde(default)]
    pub playback: PlaybackConfig,
    #[serde(default)]
    pub archive: ArchiveConfig,
}

#[derive(Debug, Deserialize)]
pub struct BackendConfig {
    /// Realtime endpoint base URL.
    #[serde(default = "default_ws_url")]
    pub ws_url: String,

    /// REST base URL for agent lookup; lookup is skipped when unset.
    #[serde(default)]
    pub api_url: Option<String>,

    /// Seconds to wait for the channel's open event.
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

#[derive(Debug, Deserialize)]
pub struct AudioConfig {
    /// Sample rate on the wire (the backend expects 16 kHz).
    #[serde(default = "default_wire_sample_rate")]
    pub wire_sample_rate: u32,

    /// Channel count on the wire (1 = mono).
    #[serde(default = "default_channels")]
    pub channels: u16,

    /// Outbound audio framing: `binary` or `base64_json`.
    #[serde(default)]
    pub encoding: AudioWireEncoding,
}

#[derive(Debug, Deserialize)]
pub struct PlaybackConfig {
    /// Guard offset in milliseconds absorbing scheduling jitter.
    #[serde(default = "default_guard_offset_ms")]
    pub guard_offset_ms: u64,

    /// Output gain.
    #[serde(default = "default_gain")]
    pub gain: f32,
}

#[derive(Debug, Deserialize)]
pub struct ArchiveConfig {
    /// Write each session's outbound audio to a WAV file.
    #[serde(default)]
    pub enabled: bool,

    /// Directory for archived sessions.
    #[serde(default = "default_archive_dir")]
    pub dir: String,
}

fn default_ws_url() -> String {
    "ws://127.0.0.1:8000".to_string()
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_wire_sample_rate() -> u32 {
    16000
}

fn default_channels() -> u16 {
    1
}

fn default_guard_offset_ms() -> u64 {
    10
}

fn default_gain() -> f32 {
    1.0
}

fn default_archive_dir() -> String {
    "recordings".to_string()
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            ws_url: default_ws_url(),
            api_url: None,
            connect_timeout_secs: default_connect_timeout_secs(),
        }
    }
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            wire_sample_rate: default_wire_sample_rate(),
            channels: default_channels(),
            encoding: AudioWireEncoding::default(),
        }
    }
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            guard_offset_ms: default_guard_offset_ms(),
            gain: default_gain(),
        }
    }
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            dir: default_archive_dir(),
        }
    }
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .build()?;

        Ok(settings.try_deserialize()?)
    }

    /// Build a session configuration for a call to `agent_id`.
    pub fn session_config(&self, agent_id: Option<String>) -> SessionConfig {
        SessionConfig {
            ws_base: self.backend.ws_url.clone(),
            api_base: self.backend.api_url.clone(),
            agent_id,
            wire_sample_rate: self.audio.wire_sample_rate,
            channels: self.audio.channels,
            connect_timeout: Duration::from_secs(self.backend.connect_timeout_secs),
            guard_offset: Duration::from_millis(self.playback.guard_offset_ms),
            gain: self.playback.gain,
            audio_encoding: self.audio.encoding,
            archive_dir: self
                .archive
                .enabled
                .then(|| PathBuf::from(&self.archive.dir)),
            ..SessionConfig::default()
        }
    }
}
