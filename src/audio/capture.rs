use anyhow::{Context, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// How many capture buffers may queue up before new ones are dropped.
///
/// Capture frames are only useful live; a session that cannot drain them at
/// realtime rate should lose audio rather than accumulate latency.
const CAPTURE_QUEUE_DEPTH: usize = 32;

/// A buffer of mono float samples at the input device's native rate.
///
/// Quantization and downsampling to the wire format happen later, in the
/// encoder, so frames carry the rate they were captured at.
#[derive(Debug, Clone)]
pub struct CaptureFrame {
    /// Normalized samples in [-1.0, 1.0], mono.
    pub samples: Vec<f32>,
    /// Sample rate the device delivered these samples at.
    pub sample_rate: u32,
}

/// Configuration for acquiring an input device.
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    /// Requested channel count (the capture stream downmixes to mono).
    pub channels: u16,
    /// Ask the host for echo cancellation. cpal's portable API has no switch
    /// for this, so the hint is recorded for backends that expose one.
    pub echo_cancellation: bool,
    /// Ask the host for noise suppression. Same caveat as echo cancellation.
    pub noise_suppression: bool,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            channels: 1,
            echo_cancellation: true,
            noise_suppression: true,
        }
    }
}

/// Microphone capture backend trait.
///
/// The session owns exactly one capture pipeline and substitutes a fake
/// implementation in tests.
#[async_trait::async_trait]
pub trait AudioCapture: Send {
    /// Start capturing audio.
    ///
    /// Returns a channel receiver that will receive capture frames until
    /// `stop` is called or the backend is dropped.
    async fn start(&mut self) -> Result<mpsc::Receiver<CaptureFrame>>;

    /// Stop capturing audio. Safe to call when not capturing.
    async fn stop(&mut self) -> Result<()>;

    /// Check if the backend is currently capturing.
    fn is_capturing(&self) -> bool;

    /// Backend name for logging.
    fn name(&self) -> &str;
}

/// Creates capture backends for a session.
pub trait CaptureFactory: Send + Sync {
    fn create(&self, config: CaptureConfig) -> Result<Box<dyn AudioCapture>>;
}

/// Wrapper to make `cpal::Stream` Send.
///
/// The stream is `!Send` on some platforms due to internal raw pointers, but
/// we only keep it alive and eventually drop it; its audio callback runs on a
/// thread cpal manages itself.
struct SendStream(#[allow(dead_code)] cpal::Stream);

// SAFETY: the stream is never accessed from another thread after creation,
// only held and dropped.
unsafe impl Send for SendStream {}

/// Default microphone backend built on cpal.
pub struct MicrophoneCapture {
    config: CaptureConfig,
    stream: Option<SendStream>,
    capturing: bool,
}

impl MicrophoneCapture {
    pub fn new(config: CaptureConfig) -> Self {
        Self {
            config,
            stream: None,
            capturing: false,
        }
    }
}

#[async_trait::async_trait]
impl AudioCapture for MicrophoneCapture {
    async fn start(&mut self) -> Result<mpsc::Receiver<CaptureFrame>> {
        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .context("No input device available")?;
        let device_name = device.name().unwrap_or_else(|_| "unknown".into());

        let default_config = device
            .default_input_config()
            .context("Failed to read input device configuration")?;

        let native_rate = default_config.sample_rate().0;
        let channels = default_config.channels();

        let stream_config = cpal::StreamConfig {
            channels,
            sample_rate: cpal::SampleRate(native_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        info!(
            device = %device_name,
            native_rate,
            channels,
            echo_cancellation = self.config.echo_cancellation,
            noise_suppression = self.config.noise_suppression,
            "Starting microphone capture"
        );

        let (tx, rx) = mpsc::channel(CAPTURE_QUEUE_DEPTH);

        let stream = match default_config.sample_format() {
            cpal::SampleFormat::F32 => build_input_stream_f32(
                &device,
                &stream_config,
                tx,
                native_rate,
                channels as usize,
            )?,
            cpal::SampleFormat::I16 => build_input_stream_i16(
                &device,
                &stream_config,
                tx,
                native_rate,
                channels as usize,
            )?,
            other => anyhow::bail!("Unsupported input sample format: {other:?}"),
        };

        stream.play().context("Failed to start input stream")?;

        self.stream = Some(SendStream(stream));
        self.capturing = true;

        Ok(rx)
    }

    async fn stop(&mut self) -> Result<()> {
        if self.stream.take().is_some() {
            debug!("Microphone capture stopped");
        }
        self.capturing = false;
        Ok(())
    }

    fn is_capturing(&self) -> bool {
        self.capturing
    }

    fn name(&self) -> &str {
        "cpal-microphone"
    }
}

fn build_input_stream_f32(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    tx: mpsc::Sender<CaptureFrame>,
    native_rate: u32,
    channels: usize,
) -> Result<cpal::Stream> {
    device
        .build_input_stream(
            config,
            move |data: &[f32], _info: &cpal::InputCallbackInfo| {
                forward_frame(&tx, downmix_f32(data, channels), native_rate);
            },
            |err| error!("Input stream error: {err}"),
            None,
        )
        .context("Failed to build input stream")
}

fn build_input_stream_i16(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    tx: mpsc::Sender<CaptureFrame>,
    native_rate: u32,
    channels: usize,
) -> Result<cpal::Stream> {
    device
        .build_input_stream(
            config,
            move |data: &[i16], _info: &cpal::InputCallbackInfo| {
                let floats: Vec<f32> = data.iter().map(|&s| s as f32 / 32768.0).collect();
                forward_frame(&tx, downmix_f32(&floats, channels), native_rate);
            },
            |err| error!("Input stream error: {err}"),
            None,
        )
        .context("Failed to build input stream")
}

/// Average interleaved channels down to mono.
fn downmix_f32(data: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return data.to_vec();
    }
    data.chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}

fn forward_frame(tx: &mpsc::Sender<CaptureFrame>, samples: Vec<f32>, sample_rate: u32) {
    if samples.is_empty() {
        return;
    }
    if tx
        .try_send(CaptureFrame {
            samples,
            sample_rate,
        })
        .is_err()
    {
        // Receiver is gone or backed up; live audio is dropped, not queued.
        warn!("Capture queue full, dropping frame");
    }
}

/// Factory for the default microphone backend.
pub struct MicrophoneFactory;

impl CaptureFactory for MicrophoneFactory {
    fn create(&self, config: CaptureConfig) -> Result<Box<dyn AudioCapture>> {
        Ok(Box::new(MicrophoneCapture::new(config)))
    }
}
