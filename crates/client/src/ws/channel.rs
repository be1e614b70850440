//! The real-time event channel: one socket, one event bus, and the
//! authentication handshake that ties the socket to the session identity.

use std::sync::Arc;

use getyourshare_shared::{EventType, ServerEvent};
use serde_json::Value;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::bus::{EventBus, Subscription};
use super::connection::{ConnectionListener, ConnectionState, WsHandle};
use crate::auth_session::Session;

type Callback = Arc<dyn Fn() + Send + Sync>;
type ErrorCallback = Arc<dyn Fn(&str) + Send + Sync>;

/// Optional lifecycle hooks.
#[derive(Clone, Default)]
pub struct ChannelCallbacks {
    pub on_open: Option<Callback>,
    pub on_close: Option<Callback>,
    pub on_error: Option<ErrorCallback>,
}

impl ChannelCallbacks {
    pub fn on_open(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_open = Some(Arc::new(f));
        self
    }

    pub fn on_close(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_close = Some(Arc::new(f));
        self
    }

    pub fn on_error(mut self, f: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Arc::new(f));
        self
    }
}

pub struct RealtimeChannel {
    handle: WsHandle,
    bus: EventBus,
    callbacks: ChannelCallbacks,
}

impl RealtimeChannel {
    pub fn new(handle: WsHandle, callbacks: ChannelCallbacks) -> Self {
        Self {
            handle,
            bus: EventBus::new(),
            callbacks,
        }
    }

    pub fn handle(&self) -> &WsHandle {
        &self.handle
    }

    pub fn state(&self) -> ConnectionState {
        self.handle.state()
    }

    pub fn is_connected(&self) -> bool {
        self.handle.state().is_connected()
    }

    /// Register a handler for one event type.
    pub fn on(
        &self,
        event: EventType,
        handler: impl Fn(&Value) + Send + Sync + 'static,
    ) -> Subscription {
        self.bus.on(event, handler)
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    /// Send the authenticate message if the socket is open and not yet
    /// bound to `user_id`. Returns whether a message went out.
    ///
    /// The state only becomes `Authenticated` once the message is queued.
    pub fn authenticate(&self, user_id: &str) -> bool {
        let needed = match self.handle.state() {
            ConnectionState::Connected => true,
            ConnectionState::Authenticated { user_id: current } => current != user_id,
            _ => false,
        };
        if !needed {
            return false;
        }

        if let Err(e) = self.handle.authenticate(user_id) {
            self.handle_error(&e);
            return false;
        }
        // The socket may have closed in the meantime
        self.handle.update_state(|state| {
            if !state.is_connected() {
                return false;
            }
            *state = ConnectionState::Authenticated {
                user_id: user_id.to_string(),
            };
            true
        });
        crate::log_info!("Authenticated notification channel as user {}", user_id);
        true
    }

    /// Forget the bound identity after logout. The socket stays open.
    pub fn deauthenticate(&self) -> bool {
        let reset = self.handle.update_state(|state| {
            if state.authenticated_user().is_none() {
                return false;
            }
            *state = ConnectionState::Connected;
            true
        });
        if reset {
            crate::log_info!("Notification channel no longer bound to a user");
        }
        reset
    }

    /// Keep the socket authenticated as the session identity.
    ///
    /// Re-evaluates on every connection-state change and every session
    /// change, so it does not matter which of the two becomes ready first.
    pub fn spawn_auth_watcher(
        self: &Arc<Self>,
        mut session: watch::Receiver<Session>,
    ) -> JoinHandle<()> {
        let channel = Arc::clone(self);
        let mut state = self.handle.subscribe_state();
        tokio::spawn(async move {
            loop {
                let user_id = session.borrow_and_update().user_id().map(str::to_string);
                state.borrow_and_update();
                match user_id {
                    Some(user_id) => channel.authenticate(&user_id),
                    None => channel.deauthenticate(),
                };

                tokio::select! {
                    changed = state.changed() => if changed.is_err() { break },
                    changed = session.changed() => if changed.is_err() { break },
                }
            }
            crate::log_debug!("Auth watcher stopped");
        })
    }

    pub fn handle_open(&self) {
        crate::log_info!("Notification channel open");
        if let Some(on_open) = &self.callbacks.on_open {
            on_open();
        }
    }

    /// Decode one inbound frame and deliver it. Bad frames are reported
    /// through `on_error` and otherwise ignored.
    pub fn handle_message(&self, text: &str) {
        let event: ServerEvent = match serde_json::from_str(text) {
            Ok(event) => event,
            Err(e) => {
                crate::log_warn!("Dropping malformed frame: {}", e);
                self.handle_error(&format!("malformed frame: {e}"));
                return;
            }
        };
        if event.kind == EventType::Unknown {
            crate::log_debug!("Ignoring event of unknown type");
            return;
        }
        let delivered = self.bus.dispatch(&event);
        crate::log_debug!("Event {} delivered to {} handlers", event.kind, delivered);
    }

    pub fn handle_close(&self) {
        crate::log_warn!("Notification channel closed");
        if let Some(on_close) = &self.callbacks.on_close {
            on_close();
        }
    }

    pub fn handle_error(&self, error: &str) {
        crate::log_error!("Notification channel error: {}", error);
        if let Some(on_error) = &self.callbacks.on_error {
            on_error(error);
        }
    }
}

impl ConnectionListener for RealtimeChannel {
    fn on_open(&self) {
        self.handle_open();
    }

    fn on_text(&self, text: &str) {
        self.handle_message(text);
    }

    fn on_close(&self) {
        self.handle_close();
    }

    fn on_error(&self, error: &str) {
        self.handle_error(error);
    }
}
