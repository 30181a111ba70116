use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use tracing::{debug, error, info};

use super::codec;

/// Computes start times for sequential, gapless, non-overlapping playback.
///
/// Every buffer starts at `max(now + guard, next_play_time)` and advances the
/// cursor by its own duration, so buffers play back-to-back in arrival order
/// and never in the past. The guard offset absorbs the scheduling jitter of
/// the step between reading the clock and enqueueing the buffer.
#[derive(Debug)]
pub struct PlaybackScheduler {
    next_play_time: f64,
    guard_offset: f64,
}

impl PlaybackScheduler {
    pub fn new(guard_offset: Duration) -> Self {
        Self {
            next_play_time: 0.0,
            guard_offset: guard_offset.as_secs_f64(),
        }
    }

    /// Schedule a buffer of `duration` seconds against clock time `now`.
    /// Returns the start time and advances the cursor past the buffer.
    pub fn schedule(&mut self, now: f64, duration: f64) -> f64 {
        let start = (now + self.guard_offset).max(self.next_play_time);
        self.next_play_time = start + duration;
        start
    }

    /// The time the most recently scheduled buffer will finish.
    pub fn next_play_time(&self) -> f64 {
        self.next_play_time
    }

    pub fn reset(&mut self) {
        self.next_play_time = 0.0;
    }
}

/// Playback sink trait. One sink per session; tests substitute a fake.
pub trait PlaybackSink: Send {
    /// Queue a wire-format PCM16 frame for playback. Zero-length frames are
    /// ignored.
    fn play(&mut self, pcm: &[u8]) -> Result<()>;

    /// Adjust output volume without rebuilding the audio pipeline.
    fn set_gain(&mut self, gain: f32);

    /// Stop playback and release the output device.
    fn close(&mut self);
}

/// Creates playback sinks for a session.
pub trait PlaybackFactory: Send + Sync {
    fn create(&self, wire_rate: u32, guard_offset: Duration, gain: f32)
        -> Result<Box<dyn PlaybackSink>>;
}

/// A buffer scheduled at an absolute position on the output sample clock.
struct ScheduledBuffer {
    start_sample: u64,
    samples: Vec<f32>,
    offset: usize,
}

struct SinkState {
    queue: VecDeque<ScheduledBuffer>,
    gain: f32,
}

impl SinkState {
    /// The sample due at absolute clock position `pos`, or silence if the
    /// next scheduled buffer has not started yet.
    fn next_sample(&mut self, pos: u64) -> f32 {
        loop {
            let Some(front) = self.queue.front_mut() else {
                return 0.0;
            };
            if front.offset >= front.samples.len() {
                self.queue.pop_front();
                continue;
            }
            if front.start_sample + front.offset as u64 > pos {
                return 0.0;
            }
            let sample = front.samples[front.offset];
            front.offset += 1;
            return sample;
        }
    }
}

struct SinkShared {
    state: Mutex<SinkState>,
    /// Samples rendered since the stream started; the playback clock.
    clock_samples: AtomicU64,
}

/// Wrapper to make `cpal::Stream` Send; see `capture.rs`.
struct SendStream(#[allow(dead_code)] cpal::Stream);

// SAFETY: held for lifetime management only, never used cross-thread.
unsafe impl Send for SendStream {}

/// Speaker output built on cpal.
///
/// Inbound frames are decoded to floats, resampled to the device rate, and
/// queued at the start position the scheduler assigns. The output callback
/// renders queued buffers against a monotonically increasing sample counter,
/// filling silence until each buffer's start position is reached, and applies
/// the shared gain factor to every sample.
pub struct SpeakerSink {
    shared: Arc<SinkShared>,
    scheduler: PlaybackScheduler,
    wire_rate: u32,
    device_rate: u32,
    stream: Option<SendStream>,
}

impl SpeakerSink {
    pub fn open(wire_rate: u32, guard_offset: Duration, gain: f32) -> Result<Self> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .context("No output device available")?;
        let device_name = device.name().unwrap_or_else(|_| "unknown".into());

        let default_config = device
            .default_output_config()
            .context("Failed to read output device configuration")?;

        if default_config.sample_format() != cpal::SampleFormat::F32 {
            anyhow::bail!(
                "Unsupported output sample format: {:?}",
                default_config.sample_format()
            );
        }

        let device_rate = default_config.sample_rate().0;
        let channels = default_config.channels() as usize;

        let stream_config = cpal::StreamConfig {
            channels: channels as u16,
            sample_rate: cpal::SampleRate(device_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        info!(device = %device_name, device_rate, channels, "Opening playback output");

        let shared = Arc::new(SinkShared {
            state: Mutex::new(SinkState {
                queue: VecDeque::new(),
                gain,
            }),
            clock_samples: AtomicU64::new(0),
        });

        let shared_cb = Arc::clone(&shared);
        let stream = device
            .build_output_stream(
                &stream_config,
                move |data: &mut [f32], _info: &cpal::OutputCallbackInfo| {
                    let frames = data.len() / channels;
                    let base = shared_cb.clock_samples.load(Ordering::Acquire);
                    match shared_cb.state.lock() {
                        Ok(mut state) => {
                            for i in 0..frames {
                                let sample = state.next_sample(base + i as u64) * state.gain;
                                for ch in 0..channels {
                                    data[i * channels + ch] = sample;
                                }
                            }
                        }
                        Err(_) => data.fill(0.0),
                    }
                    shared_cb
                        .clock_samples
                        .fetch_add(frames as u64, Ordering::AcqRel);
                },
                |err| error!("Output stream error: {err}"),
                None,
            )
            .context("Failed to build output stream")?;

        stream.play().context("Failed to start output stream")?;

        Ok(Self {
            shared,
            scheduler: PlaybackScheduler::new(guard_offset),
            wire_rate,
            device_rate,
            stream: Some(SendStream(stream)),
        })
    }
}

impl PlaybackSink for SpeakerSink {
    fn play(&mut self, pcm: &[u8]) -> Result<()> {
        if pcm.is_empty() {
            return Ok(());
        }

        let samples = codec::decode_frame(pcm, self.wire_rate, self.device_rate);
        if samples.is_empty() {
            return Ok(());
        }

        let duration = samples.len() as f64 / self.device_rate as f64;
        let now =
            self.shared.clock_samples.load(Ordering::Acquire) as f64 / self.device_rate as f64;
        let start = self.scheduler.schedule(now, duration);
        let start_sample = (start * self.device_rate as f64).round() as u64;

        let mut state = self
            .shared
            .state
            .lock()
            .map_err(|_| anyhow::anyhow!("Playback queue lock poisoned"))?;
        state.queue.push_back(ScheduledBuffer {
            start_sample,
            samples,
            offset: 0,
        });

        Ok(())
    }

    fn set_gain(&mut self, gain: f32) {
        if let Ok(mut state) = self.shared.state.lock() {
            state.gain = gain.max(0.0);
        }
    }

    fn close(&mut self) {
        if self.stream.take().is_some() {
            debug!("Playback output closed");
        }
        if let Ok(mut state) = self.shared.state.lock() {
            state.queue.clear();
        }
        self.scheduler.reset();
    }
}

impl Drop for SpeakerSink {
    fn drop(&mut self) {
        self.close();
    }
}

/// Factory for the default speaker sink.
pub struct SpeakerFactory;

impl PlaybackFactory for SpeakerFactory {
    fn create(
        &self,
        wire_rate: u32,
        guard_offset: Duration,
        gain: f32,
    ) -> Result<Box<dyn PlaybackSink>> {
        Ok(Box::new(SpeakerSink::open(wire_rate, guard_offset, gain)?))
    }
}
