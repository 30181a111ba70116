use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use base64::Engine;
use futures::{SinkExt, StreamExt};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info, warn};

use super::{
    AudioWireEncoding, ClientMessage, ConnectTarget, ServerMessage, Transport, TransportEvent,
    TransportFactory,
};

/// Outbound messages queued ahead of the socket writer.
const OUTBOUND_QUEUE_DEPTH: usize = 64;
/// Inbound events queued ahead of the session's consumer.
const INBOUND_QUEUE_DEPTH: usize = 256;

/// WebSocket implementation of the transport contract.
///
/// Binary messages are opaque audio frames; text messages are JSON control
/// envelopes. A writer task drains an outbound queue into the socket sink
/// and a reader task maps socket traffic onto `TransportEvent`s.
pub struct WsTransport {
    url: String,
    encoding: AudioWireEncoding,
    outbound: Mutex<Option<mpsc::Sender<Message>>>,
    open: Arc<AtomicBool>,
    tasks: Vec<JoinHandle<()>>,
}

impl WsTransport {
    pub fn new(url: impl Into<String>, encoding: AudioWireEncoding) -> Self {
        Self {
            url: url.into(),
            encoding,
            outbound: Mutex::new(None),
            open: Arc::new(AtomicBool::new(false)),
            tasks: Vec::new(),
        }
    }

    async fn enqueue(&self, msg: Message) -> Result<()> {
        let guard = self.outbound.lock().await;
        if let Some(tx) = guard.as_ref() {
            if tx.send(msg).await.is_err() {
                // Writer is gone; the reader will report the close.
                debug!("Outbound queue closed, dropping message");
            }
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl Transport for WsTransport {
    async fn open(&mut self) -> Result<mpsc::Receiver<TransportEvent>> {
        info!("Connecting WebSocket to {}", self.url);

        let (stream, _response) = connect_async(self.url.as_str())
            .await
            .with_context(|| format!("Failed to connect to {}", self.url))?;

        info!("WebSocket connected");

        let (mut sink, mut source) = stream.split();
        let (out_tx, mut out_rx) = mpsc::channel::<Message>(OUTBOUND_QUEUE_DEPTH);
        let (evt_tx, evt_rx) = mpsc::channel::<TransportEvent>(INBOUND_QUEUE_DEPTH);

        self.open.store(true, Ordering::SeqCst);
        *self.outbound.lock().await = Some(out_tx);

        let writer = tokio::spawn(async move {
            while let Some(msg) = out_rx.recv().await {
                let closing = matches!(msg, Message::Close(_));
                if sink.send(msg).await.is_err() {
                    break;
                }
                if closing {
                    break;
                }
            }
            let _ = sink.close().await;
            debug!("WebSocket writer stopped");
        });

        let open = Arc::clone(&self.open);
        let reader = tokio::spawn(async move {
            let mut close_reason: Option<String> = None;
            while let Some(item) = source.next().await {
                match item {
                    Ok(Message::Binary(bytes)) => {
                        if evt_tx.send(TransportEvent::Audio(bytes.to_vec())).await.is_err() {
                            break;
                        }
                    }
                    Ok(Message::Text(text)) => match serde_json::from_str::<ServerMessage>(&text)
                    {
                        Ok(ServerMessage::Unknown) => {
                            debug!("Ignoring control message of unknown type");
                        }
                        Ok(msg) => {
                            if evt_tx.send(TransportEvent::Control(msg)).await.is_err() {
                                break;
                            }
                        }
                        Err(e) => {
                            debug!("Dropping malformed control message: {e}");
                        }
                    },
                    Ok(Message::Close(frame)) => {
                        close_reason = frame.map(|f| f.reason.to_string());
                        break;
                    }
                    Ok(_) => {} // ping/pong handled by tungstenite
                    Err(e) => {
                        warn!("WebSocket error: {e}");
                        close_reason = Some(e.to_string());
                        break;
                    }
                }
            }
            open.store(false, Ordering::SeqCst);
            let _ = evt_tx
                .send(TransportEvent::Closed {
                    reason: close_reason,
                })
                .await;
            debug!("WebSocket reader stopped");
        });

        self.tasks.push(writer);
        self.tasks.push(reader);

        Ok(evt_rx)
    }

    async fn send_audio(&self, pcm: Vec<u8>) -> Result<()> {
        if !self.is_open() {
            return Ok(());
        }
        let msg = match self.encoding {
            AudioWireEncoding::Binary => Message::Binary(pcm.into()),
            AudioWireEncoding::Base64Json => {
                let envelope = ClientMessage::Audio {
                    data: base64::engine::general_purpose::STANDARD.encode(&pcm),
                };
                Message::Text(serde_json::to_string(&envelope)?.into())
            }
        };
        self.enqueue(msg).await
    }

    async fn send_control(&self, msg: &ClientMessage) -> Result<()> {
        if !self.is_open() {
            return Ok(());
        }
        let text = serde_json::to_string(msg)?;
        self.enqueue(Message::Text(text.into())).await
    }

    async fn close(&self) -> Result<()> {
        self.open.store(false, Ordering::SeqCst);
        // Taking the sender makes repeated closes no-ops and lets the writer
        // task drain and exit once the close frame is sent.
        if let Some(tx) = self.outbound.lock().await.take() {
            let _ = tx.send(Message::Close(None)).await;
            info!("WebSocket close requested");
        }
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }
}

impl Drop for WsTransport {
    fn drop(&mut self) {
        // Dropping the outbound sender stops the writer; the reader stops
        // when the socket or event receiver goes away.
        for task in &self.tasks {
            task.abort();
        }
    }
}

/// Factory for WebSocket transports.
pub struct WsTransportFactory {
    encoding: AudioWireEncoding,
}

impl WsTransportFactory {
    pub fn new(encoding: AudioWireEncoding) -> Self {
        Self { encoding }
    }
}

impl TransportFactory for WsTransportFactory {
    fn create(&self, target: &ConnectTarget) -> Box<dyn Transport> {
        Box::new(WsTransport::new(target.realtime_url(), self.encoding))
    }
}
