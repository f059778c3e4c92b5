//! Transport client: one persistent connection to the detection server
//!
//! Connection state has exactly one writer, the transport that owns the
//! [`StateCell`]. Everything else observes it through a [`StateWatch`].

mod slot;
pub mod websocket;

pub use slot::OutboundSlot;
pub use websocket::WebSocketClient;

use crate::error::EyeError;
use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionState::Disconnected => "Disconnected",
            ConnectionState::Connecting => "Connecting",
            ConnectionState::Connected => "Connected",
        };
        f.write_str(name)
    }
}

/// Lifecycle callbacks that drive [`ConnectionState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    ConnectRequested,
    Opened,
    Closed,
    Errored,
    CloseRequested,
}

impl ConnectionState {
    /// Next state after `event`. Events that do not apply leave the state alone.
    pub fn apply(self, event: LifecycleEvent) -> ConnectionState {
        use ConnectionState::*;
        use LifecycleEvent::*;
        match (self, event) {
            (Disconnected, ConnectRequested) => Connecting,
            (Connecting, Opened) => Connected,
            (_, Closed) | (_, Errored) | (_, CloseRequested) => Disconnected,
            (state, _) => state,
        }
    }
}

/// Writable connection state, held by the transport only.
#[derive(Debug, Clone)]
pub struct StateCell {
    inner: Arc<RwLock<ConnectionState>>,
}

impl StateCell {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(ConnectionState::Disconnected)),
        }
    }

    pub fn get(&self) -> ConnectionState {
        *self.inner.read()
    }

    /// Apply `event` and return the resulting state.
    pub fn apply(&self, event: LifecycleEvent) -> ConnectionState {
        let mut state = self.inner.write();
        *state = state.apply(event);
        *state
    }

    pub fn watch(&self) -> StateWatch {
        StateWatch {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl Default for StateCell {
    fn default() -> Self {
        Self::new()
    }
}

/// Read-only view of a transport's connection state.
#[derive(Debug, Clone)]
pub struct StateWatch {
    inner: Arc<RwLock<ConnectionState>>,
}

impl StateWatch {
    pub fn get(&self) -> ConnectionState {
        *self.inner.read()
    }

    pub fn is_connected(&self) -> bool {
        self.get() == ConnectionState::Connected
    }
}

/// Persistent bidirectional message connection.
///
/// `connect` and `close` may suspend. Everything else runs to completion
/// and is called from the host tick.
#[async_trait]
pub trait Transport: Send {
    async fn connect(&mut self) -> Result<(), EyeError>;

    async fn close(&mut self) -> Result<(), EyeError>;

    fn state(&self) -> ConnectionState;

    fn state_watch(&self) -> StateWatch;

    /// Queue one binary message. Fails without queuing when not connected.
    fn send(&mut self, payload: Bytes) -> Result<(), EyeError>;

    /// Every complete inbound message received since the last call, in order.
    fn dispatch_message_queue(&mut self) -> Vec<Bytes>;
}
