use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::transcript::TranscriptEntry;

/// Lifecycle phase of a voice session. Exactly one is active at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionPhase {
    /// No session; ready to connect.
    Idle,
    /// Waiting for the input device grant.
    RequestingInputDevice,
    /// Channel opening, bounded by the connect timeout.
    Connecting,
    /// Live: capture forwarding, playback scheduled, transcripts flowing.
    Connected,
    /// The backend ended the session.
    Ended,
    /// A failure occurred; see `last_error`.
    Error,
}

/// The session snapshot exposed to consumers.
///
/// Published as an immutable value through a watch channel: every update
/// replaces the whole snapshot, so the UI layer never observes a transcript
/// mid-mutation.
#[derive(Debug, Clone, Serialize)]
pub struct SessionState {
    pub phase: ConnectionPhase,
    /// True only while the microphone pipeline is actively forwarding
    /// frames, which is bounded by the connected phase.
    pub is_recording: bool,
    pub transcript: Vec<TranscriptEntry>,
    /// Cleared on each new connection attempt.
    pub last_error: Option<String>,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            phase: ConnectionPhase::Idle,
            is_recording: false,
            transcript: Vec::new(),
            last_error: None,
        }
    }
}

/// Counters about a session, for logging and the CLI's exit summary.
#[derive(Debug, Clone, Serialize)]
pub struct SessionStats {
    pub session_id: String,
    pub started_at: DateTime<Utc>,
    pub duration_secs: f64,
    pub frames_sent: usize,
    pub frames_received: usize,
    pub transcript_entries: usize,
}
