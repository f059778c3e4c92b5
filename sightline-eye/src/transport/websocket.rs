//! WebSocket transport over tokio-tungstenite

use super::{ConnectionState, LifecycleEvent, OutboundSlot, StateCell, StateWatch, Transport};
use crate::error::EyeError;
use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, warn};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Tasks and channels of one live connection.
struct Session {
    writer: JoinHandle<()>,
    reader: JoinHandle<()>,
    close_tx: Option<oneshot::Sender<()>>,
}

impl Session {
    fn abort(self) {
        self.writer.abort();
        self.reader.abort();
    }
}

/// Client for a single `ws://` endpoint.
///
/// Frames go out through a one-slot buffer drained by a writer task. Inbound
/// messages are collected by a reader task and handed out only when the host
/// calls [`Transport::dispatch_message_queue`].
pub struct WebSocketClient {
    url: String,
    state: StateCell,
    outbound: Arc<OutboundSlot>,
    inbound_tx: mpsc::UnboundedSender<Bytes>,
    inbound_rx: mpsc::UnboundedReceiver<Bytes>,
    session: Option<Session>,
}

impl WebSocketClient {
    pub fn new(url: impl Into<String>) -> Self {
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        Self {
            url: url.into(),
            state: StateCell::new(),
            outbound: Arc::new(OutboundSlot::new()),
            inbound_tx,
            inbound_rx,
            session: None,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl Transport for WebSocketClient {
    async fn connect(&mut self) -> Result<(), EyeError> {
        if self.state.get() != ConnectionState::Disconnected {
            warn!("Connect requested while {}, ignoring", self.state.get());
            return Ok(());
        }
        if let Some(stale) = self.session.take() {
            stale.abort();
        }
        // Frames queued for a previous connection are not replayed.
        self.outbound.take();

        self.state.apply(LifecycleEvent::ConnectRequested);
        info!("Connecting to {}", self.url);

        let (ws, _response) = match connect_async(self.url.as_str()).await {
            Ok(pair) => pair,
            Err(e) => {
                error!("Failed to connect to {}: {}", self.url, e);
                self.state.apply(LifecycleEvent::Errored);
                return Err(EyeError::WebSocket(e));
            }
        };

        let (sink, stream) = ws.split();
        let (close_tx, close_rx) = oneshot::channel();
        let writer = tokio::spawn(write_loop(sink, Arc::clone(&self.outbound), close_rx, self.state.clone()));
        let reader = tokio::spawn(read_loop(stream, self.inbound_tx.clone(), self.state.clone()));
        self.session = Some(Session {
            writer,
            reader,
            close_tx: Some(close_tx),
        });

        self.state.apply(LifecycleEvent::Opened);
        info!("Connected to {}", self.url);
        Ok(())
    }

    async fn close(&mut self) -> Result<(), EyeError> {
        let Some(mut session) = self.session.take() else {
            self.state.apply(LifecycleEvent::CloseRequested);
            return Ok(());
        };

        if let Some(close_tx) = session.close_tx.take() {
            // The writer may already be gone after a socket error.
            let _ = close_tx.send(());
        }
        let writer_result = (&mut session.writer).await;
        session.reader.abort();
        self.state.apply(LifecycleEvent::CloseRequested);
        info!("Connection to {} closed", self.url);

        writer_result.map_err(|e| EyeError::Transport(format!("writer task failed: {}", e)))
    }

    fn state(&self) -> ConnectionState {
        self.state.get()
    }

    fn state_watch(&self) -> StateWatch {
        self.state.watch()
    }

    fn send(&mut self, payload: Bytes) -> Result<(), EyeError> {
        if self.state.get() != ConnectionState::Connected {
            return Err(EyeError::Transport(format!(
                "cannot send while {}",
                self.state.get()
            )));
        }
        if self.outbound.put(payload) {
            debug!("Previous frame was still pending and has been dropped");
        }
        Ok(())
    }

    fn dispatch_message_queue(&mut self) -> Vec<Bytes> {
        let mut messages = Vec::new();
        while let Ok(message) = self.inbound_rx.try_recv() {
            messages.push(message);
        }
        messages
    }
}

impl Drop for WebSocketClient {
    fn drop(&mut self) {
        if let Some(session) = self.session.take() {
            session.abort();
        }
    }
}

async fn write_loop(
    mut sink: SplitSink<WsStream, Message>,
    outbound: Arc<OutboundSlot>,
    mut close_rx: oneshot::Receiver<()>,
    state: StateCell,
) {
    loop {
        tokio::select! {
            _ = &mut close_rx => {
                if let Err(e) = sink.send(Message::Close(None)).await {
                    debug!("Close frame not delivered: {}", e);
                }
                let _ = sink.close().await;
                return;
            }
            _ = outbound.notified() => {
                while let Some(payload) = outbound.take() {
                    if let Err(e) = sink.send(Message::Binary(payload.to_vec())).await {
                        error!("WebSocket send failed: {}", e);
                        state.apply(LifecycleEvent::Errored);
                        return;
                    }
                }
            }
        }
    }
}

async fn read_loop(mut stream: SplitStream<WsStream>, inbound: mpsc::UnboundedSender<Bytes>, state: StateCell) {
    while let Some(message) = stream.next().await {
        let payload = match message {
            Ok(Message::Text(text)) => Bytes::from(text.into_bytes()),
            Ok(Message::Binary(data)) => Bytes::from(data),
            Ok(Message::Close(frame)) => {
                info!("Server closed the connection: {:?}", frame);
                state.apply(LifecycleEvent::Closed);
                return;
            }
            Ok(_) => continue,
            Err(e) => {
                error!("WebSocket error: {}", e);
                state.apply(LifecycleEvent::Errored);
                return;
            }
        };
        if inbound.send(payload).is_err() {
            return;
        }
    }
    info!("Connection stream ended");
    state.apply(LifecycleEvent::Closed);
}
