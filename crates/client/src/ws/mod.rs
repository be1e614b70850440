//! Real-time notification channel.
//!
//! ```text
//!   WsConnection ──frames──▶ RealtimeChannel ──dispatch──▶ EventBus
//!        ▲                        │                          │
//!        └──── WsHandle ◀── auth watcher            handlers (reconcile)
//! ```
//!
//! [`WsConnection`] owns the socket and its reconnect loop and reports
//! lifecycle events to a [`ConnectionListener`]. [`RealtimeChannel`] is that
//! listener: it decodes frames into typed events, fans them out through the
//! [`EventBus`], and authenticates the socket once both the connection and
//! the session identity are available.

mod bus;
mod channel;
mod connection;

pub use bus::{EventBus, Handler, Subscription};
pub use channel::{ChannelCallbacks, RealtimeChannel};
pub use connection::{ConnectionListener, ConnectionState, ReconnectConfig, WsConnection, WsHandle};
