pub mod archive;
pub mod capture;
pub mod codec;
pub mod playback;

pub use archive::SessionArchive;
pub use capture::{AudioCapture, CaptureConfig, CaptureFactory, CaptureFrame, MicrophoneFactory};
pub use playback::{PlaybackFactory, PlaybackScheduler, PlaybackSink, SpeakerFactory, SpeakerSink};
