//! The bidirectional realtime link between client and voice backend.
//!
//! A transport carries opaque binary audio frames in both directions and
//! JSON control envelopes on the text channel. The session state machine and
//! transcript aggregator only see this module's `Transport` contract, so a
//! test suite (or a different deployment) can substitute another
//! implementation without touching them.

pub mod messages;
pub mod ws;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

pub use messages::{ClientMessage, ServerMessage};
pub use ws::{WsTransport, WsTransportFactory};

/// How outbound audio frames are encoded on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AudioWireEncoding {
    /// Raw PCM16 bytes as binary WebSocket messages.
    #[default]
    Binary,
    /// `{"type": "audio", "data": "<base64>"}` text envelopes.
    Base64Json,
}

/// Where a session connects to.
#[derive(Debug, Clone)]
pub struct ConnectTarget {
    /// Base realtime URL, e.g. `ws://127.0.0.1:8000`.
    pub url: String,
    /// Agent to route the session to, if any.
    pub agent_id: Option<String>,
}

impl ConnectTarget {
    /// Full realtime endpoint URL for this target.
    pub fn realtime_url(&self) -> String {
        let base = self.url.trim_end_matches('/');
        match &self.agent_id {
            Some(id) => format!("{base}/ws/voice-browser?agent_id={id}"),
            None => format!("{base}/ws/voice-browser"),
        }
    }
}

/// Inbound traffic, already split into the two wire channels.
#[derive(Debug)]
pub enum TransportEvent {
    /// Opaque PCM16 audio frame.
    Audio(Vec<u8>),
    /// Parsed control envelope.
    Control(ServerMessage),
    /// The channel closed, either peer-initiated or after a failure.
    Closed { reason: Option<String> },
}

/// The duplex channel contract.
///
/// `open` yields the inbound event stream; sends are fire-and-forget and
/// silently drop frames while the channel is not open. Capture lifetime is
/// bounded by the connected phase, so nothing buffers across connection
/// states.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    /// Connect and return the inbound event stream.
    async fn open(&mut self) -> Result<mpsc::Receiver<TransportEvent>>;

    /// Send a binary audio frame. Dropped without error if the channel is
    /// not open.
    async fn send_audio(&self, pcm: Vec<u8>) -> Result<()>;

    /// Send a control envelope. Dropped without error if the channel is not
    /// open.
    async fn send_control(&self, msg: &ClientMessage) -> Result<()>;

    /// Close the channel. Safe to call repeatedly.
    async fn close(&self) -> Result<()>;

    fn is_open(&self) -> bool;
}

/// Creates a transport for a connect target.
pub trait TransportFactory: Send + Sync {
    fn create(&self, target: &ConnectTarget) -> Box<dyn Transport>;
}
