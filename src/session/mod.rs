//! Voice session lifecycle
//!
//! This module provides the `VoiceSession` state machine that manages:
//! - Microphone acquisition and outbound audio encoding
//! - The realtime transport channel (open, timeout, teardown)
//! - Inbound audio playback scheduling
//! - Transcript aggregation and state snapshots for the UI layer

mod config;
mod session;
mod state;

pub use config::SessionConfig;
pub use session::VoiceSession;
pub use state::{ConnectionPhase, SessionState, SessionStats};
