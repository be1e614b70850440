//! WebSocket connection with state management and auto-reconnect.
//!
//! This module provides the shared types; the socket loop itself lives in
//! `connection_native`.

use std::sync::Arc;

use futures_channel::mpsc::UnboundedSender;
use getyourshare_shared::ClientMessage;
use tokio::sync::watch;

/// Connection state for the notification socket
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    /// The authenticate message went out for this identity.
    Authenticated { user_id: String },
    Reconnecting { attempt: u32 },
    Failed { reason: String },
}

impl ConnectionState {
    /// Socket open, authenticated or not.
    pub fn is_connected(&self) -> bool {
        matches!(
            self,
            ConnectionState::Connected | ConnectionState::Authenticated { .. }
        )
    }

    pub fn is_connecting(&self) -> bool {
        matches!(
            self,
            ConnectionState::Connecting | ConnectionState::Reconnecting { .. }
        )
    }

    pub fn authenticated_user(&self) -> Option<&str> {
        match self {
            ConnectionState::Authenticated { user_id } => Some(user_id),
            _ => None,
        }
    }
}

/// Configuration for auto-reconnect behavior
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Maximum number of reconnect attempts (0 = infinite)
    pub max_attempts: u32,
    /// Initial delay in milliseconds
    pub initial_delay_ms: u32,
    /// Maximum delay in milliseconds
    pub max_delay_ms: u32,
    /// Multiplier for exponential backoff
    pub backoff_multiplier: f32,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            initial_delay_ms: 1000,
            max_delay_ms: 30000,
            backoff_multiplier: 1.5,
        }
    }
}

impl ReconnectConfig {
    /// Calculate delay for a given attempt number
    pub fn delay_for_attempt(&self, attempt: u32) -> u32 {
        let delay = self.initial_delay_ms as f32 * self.backoff_multiplier.powi(attempt as i32);
        (delay as u32).min(self.max_delay_ms)
    }

    /// Whether `attempts` failed attempts use up the budget.
    pub fn exhausted(&self, attempts: u32) -> bool {
        self.max_attempts > 0 && attempts >= self.max_attempts
    }
}

/// Socket lifecycle callbacks, invoked from the connection task.
pub trait ConnectionListener: Send + Sync {
    fn on_open(&self);

    /// One inbound text frame.
    fn on_text(&self, text: &str);

    fn on_close(&self);

    fn on_error(&self, error: &str);
}

/// Handle for sending messages through the connection and observing its
/// state. Cheap to clone; every clone feeds the same socket.
#[derive(Clone)]
pub struct WsHandle {
    sender: UnboundedSender<ClientMessage>,
    state: Arc<watch::Sender<ConnectionState>>,
    pub url: String,
}

impl WsHandle {
    pub(crate) fn new(
        sender: UnboundedSender<ClientMessage>,
        state: Arc<watch::Sender<ConnectionState>>,
        url: String,
    ) -> Self {
        Self { sender, state, url }
    }

    /// Queue a message for the socket
    pub fn send(&self, msg: ClientMessage) -> Result<(), String> {
        crate::log_debug!("WsHandle::send to '{}': {:?}", self.url, msg);
        self.sender
            .unbounded_send(msg)
            .map_err(|e| format!("Failed to send: {}", e))
    }

    /// Bind the connection to an identity
    pub fn authenticate(&self, user_id: &str) -> Result<(), String> {
        self.send(ClientMessage::Authenticate {
            user_id: user_id.to_string(),
        })
    }

    pub fn state(&self) -> ConnectionState {
        self.state.borrow().clone()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    pub(crate) fn set_state(&self, state: ConnectionState) {
        self.state.send_replace(state);
    }

    /// Apply `f` to the state atomically; watchers are woken only when it
    /// returns `true`.
    pub(crate) fn update_state(&self, f: impl FnOnce(&mut ConnectionState) -> bool) -> bool {
        self.state.send_if_modified(f)
    }
}

mod connection_native;
pub use connection_native::WsConnection;
