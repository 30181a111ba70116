use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::config::SessionConfig;
use super::state::{ConnectionPhase, SessionState, SessionStats};
use crate::audio::capture::{AudioCapture, CaptureConfig, CaptureFactory, CaptureFrame, MicrophoneFactory};
use crate::audio::playback::{PlaybackFactory, PlaybackSink, SpeakerFactory};
use crate::audio::{codec, SessionArchive};
use crate::directory::AgentDirectory;
use crate::transcript::TranscriptLog;
use crate::transport::{
    ClientMessage, ConnectTarget, ServerMessage, Transport, TransportEvent, TransportFactory,
    WsTransportFactory,
};

/// A real-time voice session against a conversational agent backend.
///
/// Owns the microphone pipeline, the transport channel, and the playback
/// sink for the duration of one call; state is published as immutable
/// snapshots through a watch channel. At most one session is live per
/// instance; a second `connect` while one is in flight is a no-op. All
/// failures surface through the snapshot (`phase` + `last_error`), never as
/// panics or returned errors.
pub struct VoiceSession {
    inner: Arc<Inner>,
}

struct Inner {
    config: SessionConfig,
    state: watch::Sender<SessionState>,
    /// Guards against a second connect while one is in flight.
    connecting: AtomicBool,
    /// Cleared when the owner begins disposal; checked by every task and by
    /// the device-grant path so late grants are released, not attached.
    alive: AtomicBool,
    /// Bumped by disconnect so an in-flight connect notices it was cancelled
    /// and releases whatever it acquired instead of going live.
    epoch: AtomicUsize,
    active: Mutex<Option<ActiveCall>>,
    frames_sent: AtomicUsize,
    frames_received: AtomicUsize,
    started_at: std::sync::Mutex<chrono::DateTime<Utc>>,
    directory: Option<AgentDirectory>,
    transports: Box<dyn TransportFactory>,
    captures: Box<dyn CaptureFactory>,
    playbacks: Box<dyn PlaybackFactory>,
}

/// Everything a live call owns. Created in one place during connect and
/// released by one teardown routine on every exit path.
struct ActiveCall {
    transport: Arc<dyn Transport>,
    capture: Box<dyn AudioCapture>,
    tasks: Vec<JoinHandle<()>>,
}

impl VoiceSession {
    /// Create a session with the default microphone, speaker, and WebSocket
    /// transport.
    pub fn new(config: SessionConfig) -> Self {
        let encoding = config.audio_encoding;
        Self::with_factories(
            config,
            Box::new(WsTransportFactory::new(encoding)),
            Box::new(MicrophoneFactory),
            Box::new(SpeakerFactory),
        )
    }

    /// Create a session with substitute transport/capture/playback
    /// implementations.
    pub fn with_factories(
        config: SessionConfig,
        transports: Box<dyn TransportFactory>,
        captures: Box<dyn CaptureFactory>,
        playbacks: Box<dyn PlaybackFactory>,
    ) -> Self {
        let (state, _) = watch::channel(SessionState::default());
        let directory = config.api_base.as_ref().map(|base| AgentDirectory::new(base.clone()));

        Self {
            inner: Arc::new(Inner {
                config,
                state,
                connecting: AtomicBool::new(false),
                alive: AtomicBool::new(true),
                epoch: AtomicUsize::new(0),
                active: Mutex::new(None),
                frames_sent: AtomicUsize::new(0),
                frames_received: AtomicUsize::new(0),
                started_at: std::sync::Mutex::new(Utc::now()),
                directory,
                transports,
                captures,
                playbacks,
            }),
        }
    }

    /// Subscribe to state snapshots.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.inner.state.subscribe()
    }

    /// The current state snapshot.
    pub fn state(&self) -> SessionState {
        self.inner.state.borrow().clone()
    }

    /// Counters for the current or most recent call.
    pub fn stats(&self) -> SessionStats {
        let inner = &self.inner;
        let started_at = *inner.started_at.lock().unwrap_or_else(|e| e.into_inner());
        let duration = Utc::now().signed_duration_since(started_at);

        SessionStats {
            session_id: inner.config.session_id.clone(),
            started_at,
            duration_secs: duration.num_milliseconds() as f64 / 1000.0,
            frames_sent: inner.frames_sent.load(Ordering::Relaxed),
            frames_received: inner.frames_received.load(Ordering::Relaxed),
            transcript_entries: inner.state.borrow().transcript.len(),
        }
    }

    /// Start a session.
    ///
    /// No-op if a connection or connection attempt is already in flight.
    /// Failures (device denied, connect timeout, transport error) surface
    /// through the state snapshot as `phase = error` plus `last_error`.
    pub async fn connect(&self) {
        let inner = &self.inner;

        if inner.connecting.swap(true, Ordering::SeqCst) {
            debug!("Connect already in flight, skipping");
            return;
        }
        let _guard = InflightGuard(&inner.connecting);

        if inner.active.lock().await.is_some() {
            debug!("Session already connected, skipping");
            return;
        }

        info!("Starting voice session: {}", inner.config.session_id);

        *inner.started_at.lock().unwrap_or_else(|e| e.into_inner()) = Utc::now();
        inner.frames_sent.store(0, Ordering::Relaxed);
        inner.frames_received.store(0, Ordering::Relaxed);

        // Fresh snapshot per attempt: transcript cleared, error cleared.
        inner.state.send_replace(SessionState {
            phase: ConnectionPhase::RequestingInputDevice,
            ..SessionState::default()
        });

        let epoch = inner.epoch.load(Ordering::SeqCst);

        match self.try_connect(epoch).await {
            Ok(Established::Live) => {}
            Ok(Established::Disposed) => {
                debug!("Connect attempt cancelled, resources released");
                inner.state.send_modify(|s| {
                    s.phase = ConnectionPhase::Idle;
                    s.is_recording = false;
                });
            }
            Err(e) if inner.cancelled(epoch) => {
                debug!("Connect attempt cancelled: {e:#}");
                inner.release_active(false).await;
                inner.state.send_modify(|s| {
                    s.phase = ConnectionPhase::Idle;
                    s.is_recording = false;
                });
            }
            Err(e) => {
                warn!("Connect failed: {e:#}");
                inner.release_active(false).await;
                inner.state.send_modify(|s| {
                    s.phase = ConnectionPhase::Error;
                    s.is_recording = false;
                    s.last_error = Some(format!("{e:#}"));
                });
            }
        }
    }

    async fn try_connect(&self, epoch: usize) -> Result<Established> {
        let inner = &self.inner;
        let config = &inner.config;

        let mut capture = inner
            .captures
            .create(CaptureConfig {
                channels: config.channels,
                ..CaptureConfig::default()
            })
            .context("Input device unavailable")?;

        let frames = capture
            .start()
            .await
            .context("Input device unavailable")?;

        // The grant may resolve after disposal or disconnect began; stop the
        // device instead of attaching it.
        if inner.cancelled(epoch) {
            let _ = capture.stop().await;
            return Ok(Established::Disposed);
        }

        // Playback is prepared before the channel opens, the way the input
        // device was; if either device is missing the attempt fails without
        // ever touching the network.
        let sink = match inner
            .playbacks
            .create(config.wire_sample_rate, config.guard_offset, config.gain)
            .context("Output device unavailable")
        {
            Ok(sink) => sink,
            Err(e) => {
                let _ = capture.stop().await;
                return Err(e);
            }
        };

        let archive = match &config.archive_dir {
            Some(dir) => {
                match SessionArchive::create(dir, &config.session_id, config.wire_sample_rate) {
                    Ok(archive) => Some(archive),
                    Err(e) => {
                        let _ = capture.stop().await;
                        return Err(e.context("Failed to open session archive"));
                    }
                }
            }
            None => None,
        };

        inner
            .state
            .send_modify(|s| s.phase = ConnectionPhase::Connecting);

        let target = match self.resolve_target().await {
            Ok(target) => target,
            Err(e) => {
                let _ = capture.stop().await;
                return Err(e);
            }
        };
        let mut transport = inner.transports.create(&target);

        let events = match tokio::time::timeout(config.connect_timeout, transport.open()).await {
            Ok(Ok(events)) => events,
            Ok(Err(e)) => {
                let _ = capture.stop().await;
                return Err(e.context("Failed to open transport channel"));
            }
            Err(_) => {
                let _ = transport.close().await;
                let _ = capture.stop().await;
                anyhow::bail!(
                    "Connection timed out after {}s. Is the backend running?",
                    config.connect_timeout.as_secs()
                );
            }
        };

        let transport: Arc<dyn Transport> = Arc::from(transport);

        let outbound = self.spawn_outbound_pump(frames, Arc::clone(&transport), archive);
        let inbound = self.spawn_inbound_pump(events, sink);

        *inner.active.lock().await = Some(ActiveCall {
            transport,
            capture,
            tasks: vec![outbound, inbound],
        });

        // Disposal or disconnect may have begun while the bundle was being
        // assembled.
        if inner.cancelled(epoch) {
            inner.release_active(false).await;
            return Ok(Established::Disposed);
        }

        inner.state.send_modify(|s| {
            s.phase = ConnectionPhase::Connected;
            s.is_recording = true;
        });

        info!("Voice session connected");

        Ok(Established::Live)
    }

    async fn resolve_target(&self) -> Result<ConnectTarget> {
        let inner = &self.inner;

        if let (Some(directory), Some(agent_id)) =
            (&inner.directory, &inner.config.agent_id)
        {
            directory
                .lookup(agent_id)
                .await
                .with_context(|| format!("Agent {agent_id} not found"))?;
        }

        Ok(ConnectTarget {
            url: inner.config.ws_base.clone(),
            agent_id: inner.config.agent_id.clone(),
        })
    }

    /// Forwards captured audio to the transport in capture order: encode to
    /// the wire format, archive if configured, drop silently while the
    /// channel is not open.
    fn spawn_outbound_pump(
        &self,
        mut frames: mpsc::Receiver<CaptureFrame>,
        transport: Arc<dyn Transport>,
        mut archive: Option<SessionArchive>,
    ) -> JoinHandle<()> {
        let inner = Arc::clone(&self.inner);
        let wire_rate = inner.config.wire_sample_rate;

        tokio::spawn(async move {
            debug!("Outbound audio pump started");

            while let Some(frame) = frames.recv().await {
                if !inner.alive.load(Ordering::SeqCst) {
                    break;
                }

                let pcm = codec::encode_frame(&frame.samples, frame.sample_rate, wire_rate);
                if pcm.is_empty() {
                    continue;
                }

                if let Some(a) = archive.as_mut() {
                    if let Err(e) = a.write_frame(&pcm) {
                        warn!("Archive write failed, disabling archive: {e}");
                        archive = None;
                    }
                }

                if !transport.is_open() {
                    continue;
                }

                match transport.send_audio(pcm).await {
                    Ok(()) => {
                        inner.frames_sent.fetch_add(1, Ordering::Relaxed);
                    }
                    Err(e) => debug!("Dropping audio frame: {e}"),
                }
            }

            if let Some(a) = archive.take() {
                if let Err(e) = a.finish() {
                    warn!("Failed to finalize session archive: {e}");
                }
            }

            debug!("Outbound audio pump stopped");
        })
    }

    /// Processes inbound traffic in arrival order: audio to the playback
    /// sink, transcripts into the aggregator, state transitions for
    /// lifecycle control messages.
    fn spawn_inbound_pump(
        &self,
        mut events: mpsc::Receiver<TransportEvent>,
        mut sink: Box<dyn PlaybackSink>,
    ) -> JoinHandle<()> {
        let inner = Arc::clone(&self.inner);

        tokio::spawn(async move {
            debug!("Inbound pump started");
            let mut log = TranscriptLog::new();

            while let Some(event) = events.recv().await {
                if !inner.alive.load(Ordering::SeqCst) {
                    break;
                }

                match event {
                    TransportEvent::Audio(pcm) => {
                        inner.frames_received.fetch_add(1, Ordering::Relaxed);
                        if let Err(e) = sink.play(&pcm) {
                            warn!("Playback failed: {e}");
                        }
                    }
                    TransportEvent::Control(msg) => match msg {
                        ServerMessage::Transcript {
                            role,
                            content,
                            is_final,
                        } => {
                            log.apply(role, content, is_final);
                            let snapshot = log.snapshot();
                            inner.state.send_modify(|s| s.transcript = snapshot);
                        }
                        ServerMessage::Error { message } => {
                            // Non-fatal: surfaced, session continues.
                            warn!("Server error: {message}");
                            inner
                                .state
                                .send_modify(|s| s.last_error = Some(message));
                        }
                        ServerMessage::SessionStarted { agent } => {
                            info!(agent = ?agent, "Session started");
                        }
                        ServerMessage::SessionEnded { reason } => {
                            info!(reason = ?reason, "Session ended by backend");
                            inner.state.send_modify(|s| {
                                s.phase = ConnectionPhase::Ended;
                                s.is_recording = false;
                            });
                        }
                        ServerMessage::Unknown => {}
                    },
                    TransportEvent::Closed { reason } => {
                        info!(reason = ?reason, "Transport closed");
                        inner.state.send_modify(|s| {
                            if s.phase == ConnectionPhase::Connected {
                                s.phase = ConnectionPhase::Idle;
                            }
                            s.is_recording = false;
                        });
                        inner.release_active(false).await;
                        break;
                    }
                }
            }

            sink.close();
            debug!("Inbound pump stopped");
        })
    }

    /// End the session.
    ///
    /// Idempotent and safe from any phase: sends a best-effort `end` control
    /// message, closes the channel, stops capture and playback, and returns
    /// the phase to idle.
    pub async fn disconnect(&self) {
        info!("Disconnecting voice session");
        self.inner.epoch.fetch_add(1, Ordering::SeqCst);
        self.inner.release_active(true).await;
        self.inner.state.send_modify(|s| {
            s.phase = ConnectionPhase::Idle;
            s.is_recording = false;
        });
    }
}

enum Established {
    Live,
    Disposed,
}

impl Inner {
    /// True once the connect attempt tagged with `epoch` has been overtaken
    /// by a disconnect or by owner disposal.
    fn cancelled(&self, epoch: usize) -> bool {
        !self.alive.load(Ordering::SeqCst) || self.epoch.load(Ordering::SeqCst) != epoch
    }

    /// Release the active call's resources, if any. The single teardown
    /// routine used by disconnect, connect-failure cleanup, transport close,
    /// and owner disposal.
    async fn release_active(&self, graceful: bool) {
        let call = self.active.lock().await.take();
        let Some(mut call) = call else { return };

        if graceful && call.transport.is_open() {
            if let Err(e) = call.transport.send_control(&ClientMessage::End).await {
                debug!("Failed to send end message: {e}");
            }
        }

        if let Err(e) = call.transport.close().await {
            debug!("Transport close failed: {e}");
        }

        if let Err(e) = call.capture.stop().await {
            warn!("Failed to stop capture: {e}");
        }

        for task in call.tasks.drain(..) {
            task.abort();
        }

        debug!("Session resources released");
    }

    /// Synchronous best-effort release for contexts that cannot await.
    /// Dropping the bundle stops the capture stream and playback sink via
    /// their own drop paths; the transport's tasks are aborted with it.
    fn release_active_blocking(&self) {
        if let Ok(mut guard) = self.active.try_lock() {
            if let Some(call) = guard.take() {
                for task in &call.tasks {
                    task.abort();
                }
                drop(call);
            }
        }
    }
}

/// Resets the in-flight flag on every exit path, including the connect
/// future being dropped mid-await.
struct InflightGuard<'a>(&'a AtomicBool);

impl Drop for InflightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl Drop for VoiceSession {
    fn drop(&mut self) {
        self.inner.alive.store(false, Ordering::SeqCst);

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let inner = Arc::clone(&self.inner);
                handle.spawn(async move {
                    inner.release_active(false).await;
                });
            }
            Err(_) => {
                self.inner.release_active_blocking();
            }
        }
    }
}
