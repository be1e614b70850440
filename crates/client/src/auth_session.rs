//! Authentication session state with persistent storage.
//!
//! [`AuthSession`] is the single owner of the session: the credential token,
//! the identity, and the verification status. It mirrors the token and the
//! identity into two storage entries that are always written and cleared
//! together, and publishes every change on a `watch` channel so long-lived
//! services (the real-time channel) can react to logins and logouts.

use std::sync::{Arc, Mutex};

use getyourshare_shared::User;
use tokio::sync::watch;

use crate::storage::{self, KeyValueStore};

pub const TOKEN_KEY: &str = "token";
pub const USER_KEY: &str = "user";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    /// Startup state until the first verification finishes.
    Checking,
    Active,
    Expired,
}

/// Snapshot of the authenticated identity and its credential.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub identity: Option<User>,
    pub token: Option<String>,
    pub status: SessionStatus,
}

impl Session {
    fn expired() -> Self {
        Self {
            identity: None,
            token: None,
            status: SessionStatus::Expired,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == SessionStatus::Active
    }

    pub fn user_id(&self) -> Option<&str> {
        self.identity.as_ref().map(|u| u.id.as_str())
    }
}

pub struct AuthSession {
    storage: Arc<dyn KeyValueStore>,
    state: watch::Sender<Session>,
    /// Held while the two storage entries are written or removed.
    persist: Mutex<()>,
}

impl AuthSession {
    /// Restore the persisted session, if both of its entries are present.
    pub fn new(storage: Arc<dyn KeyValueStore>) -> Self {
        let token = storage.get(TOKEN_KEY);
        let identity = storage::load::<User>(storage.as_ref(), USER_KEY);

        let initial = match (token, identity) {
            (Some(token), Some(identity)) => Session {
                identity: Some(identity),
                token: Some(token),
                status: SessionStatus::Checking,
            },
            (None, None) => Session {
                identity: None,
                token: None,
                status: SessionStatus::Checking,
            },
            _ => {
                crate::log_warn!("Discarding half-persisted session");
                storage.remove(TOKEN_KEY);
                storage.remove(USER_KEY);
                Session {
                    identity: None,
                    token: None,
                    status: SessionStatus::Checking,
                }
            }
        };

        let (state, _) = watch::channel(initial);
        Self {
            storage,
            state,
            persist: Mutex::new(()),
        }
    }

    pub fn snapshot(&self) -> Session {
        self.state.borrow().clone()
    }

    /// Receiver notified on every session change.
    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.state.subscribe()
    }

    pub fn token(&self) -> Option<String> {
        self.state.borrow().token.clone()
    }

    pub fn identity(&self) -> Option<User> {
        self.state.borrow().identity.clone()
    }

    pub fn status(&self) -> SessionStatus {
        self.state.borrow().status
    }

    /// Store a fresh credential and identity and mark the session active.
    pub fn establish(&self, token: String, user: User) {
        let _guard = self.persist.lock().unwrap_or_else(|e| e.into_inner());
        self.storage.set(TOKEN_KEY, &token);
        storage::save(self.storage.as_ref(), USER_KEY, &user);
        self.state.send_replace(Session {
            identity: Some(user),
            token: Some(token),
            status: SessionStatus::Active,
        });
    }

    /// Replace the identity after a successful verification.
    pub fn set_identity(&self, user: User) {
        let _guard = self.persist.lock().unwrap_or_else(|e| e.into_inner());
        if self.state.borrow().token.is_none() {
            crate::log_warn!("Ignoring identity update without a credential");
            return;
        }
        storage::save(self.storage.as_ref(), USER_KEY, &user);
        self.state.send_modify(|session| {
            session.identity = Some(user);
            session.status = SessionStatus::Active;
        });
    }

    /// Drop the credential and identity, in memory and in storage.
    pub fn clear(&self) {
        let _guard = self.persist.lock().unwrap_or_else(|e| e.into_inner());
        self.storage.remove(TOKEN_KEY);
        self.storage.remove(USER_KEY);
        self.state.send_replace(Session::expired());
    }
}
