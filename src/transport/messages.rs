use serde::{Deserialize, Serialize};

use crate::transcript::Role;

/// Control message sent by the client over the text channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Request graceful session termination.
    End,
    /// Audio frame as base64 PCM bytes, for deployments where binary
    /// messages are unavailable.
    Audio { data: String },
}

/// Control message received from the voice backend.
///
/// Unknown `type` values deserialize to `Unknown` and are ignored rather
/// than treated as protocol errors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Partial or final speech-to-text for either party.
    Transcript {
        role: Role,
        content: String,
        is_final: bool,
    },
    /// Non-fatal server-reported error to surface in the UI.
    Error { message: String },
    /// The session is live on the backend.
    SessionStarted {
        #[serde(default)]
        agent: Option<serde_json::Value>,
    },
    /// The backend closed the session.
    SessionEnded {
        #[serde(default)]
        reason: Option<String>,
    },
    #[serde(other)]
    Unknown,
}
