pub mod audio;
pub mod config;
pub mod directory;
pub mod session;
pub mod transcript;
pub mod transport;

pub use audio::{
    codec, AudioCapture, CaptureConfig, CaptureFactory, CaptureFrame, MicrophoneFactory,
    PlaybackFactory, PlaybackScheduler, PlaybackSink, SessionArchive, SpeakerFactory,
};
pub use config::Config;
pub use directory::{AgentDirectory, AgentSummary};
pub use session::{ConnectionPhase, SessionConfig, SessionState, SessionStats, VoiceSession};
pub use transcript::{Role, TranscriptEntry, TranscriptLog};
pub use transport::{
    AudioWireEncoding, ClientMessage, ConnectTarget, ServerMessage, Transport, TransportEvent,
    TransportFactory, WsTransport, WsTransportFactory,
};
