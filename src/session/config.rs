use std::path::PathBuf;
use std::time::Duration;

use crate::transport::AudioWireEncoding;

/// Configuration for a voice session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Unique session identifier (e.g., "call-7f3a…").
    pub session_id: String,

    /// Base realtime URL, e.g. `ws://127.0.0.1:8000`.
    pub ws_base: String,

    /// REST base URL for agent lookup. Lookup is skipped when unset.
    pub api_base: Option<String>,

    /// Agent to route the session to.
    pub agent_id: Option<String>,

    /// Sample rate of audio on the wire (the backend expects 16 kHz).
    pub wire_sample_rate: u32,

    /// Channel count on the wire (1 = mono).
    pub channels: u16,

    /// How long a connect attempt may wait for the channel's open event.
    pub connect_timeout: Duration,

    /// Playback guard offset absorbing scheduling jitter.
    pub guard_offset: Duration,

    /// Playback gain.
    pub gain: f32,

    /// Outbound audio framing.
    pub audio_encoding: AudioWireEncoding,

    /// Where to archive outbound session audio, if anywhere.
    pub archive_dir: Option<PathBuf>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            session_id: format!("call-{}", uuid::Uuid::new_v4()),
            ws_base: "ws://127.0.0.1:8000".to_string(),
            api_base: None,
            agent_id: None,
            wire_sample_rate: 16000,
            channels: 1,
            connect_timeout: Duration::from_secs(10),
            guard_offset: Duration::from_millis(10),
            gain: 1.0,
            audio_encoding: AudioWireEncoding::Binary,
            archive_dir: None,
        }
    }
}
