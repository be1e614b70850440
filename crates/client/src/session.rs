//! Session operations: verification, login, logout and the periodic monitor.

use std::sync::Arc;
use std::time::Duration;

use getyourshare_shared::{LoginRequest, User};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::api_client::ApiClient;
use crate::auth_session::AuthSession;

const LOGIN_FAILED: &str = "Connexion échouée";
const TWO_FACTOR_SENT: &str = "Code 2FA envoyé";

/// Result of a login attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum LoginOutcome {
    Authenticated(User),
    /// A second factor is needed; nothing has been stored yet.
    TwoFactorRequired { temp_token: String, message: String },
    Failed { error: String },
}

impl LoginOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, LoginOutcome::Authenticated(_))
    }

    pub fn requires_2fa(&self) -> bool {
        matches!(self, LoginOutcome::TwoFactorRequired { .. })
    }

    pub fn user(&self) -> Option<&User> {
        match self {
            LoginOutcome::Authenticated(user) => Some(user),
            _ => None,
        }
    }
}

#[derive(Clone)]
pub struct SessionStore {
    auth: Arc<AuthSession>,
    api: ApiClient,
}

impl SessionStore {
    pub fn new(auth: Arc<AuthSession>, api: ApiClient) -> Self {
        Self { auth, api }
    }

    pub fn auth(&self) -> &Arc<AuthSession> {
        &self.auth
    }

    /// Check the stored credential against the backend.
    ///
    /// Without a credential the session is marked expired and no request is
    /// made. Any failure, rejection or network, ends the session.
    pub async fn verify_session(&self) -> bool {
        let Some(token) = self.auth.token() else {
            self.auth.clear();
            return false;
        };

        match self.api.me().await {
            Ok(user) => {
                // A logout or re-login while the check was in flight wins.
                if self.auth.token().as_deref() != Some(token.as_str()) {
                    crate::log_debug!("Credential changed during verification; ignoring result");
                    return self.auth.snapshot().is_active();
                }
                crate::log_debug!("Session verified for user {}", user.id);
                self.auth.set_identity(user);
                true
            }
            Err(e) => {
                crate::log_warn!("Session verification failed: {}", e);
                self.auth.clear();
                false
            }
        }
    }

    pub async fn login(&self, email: &str, password: &str) -> LoginOutcome {
        let request = LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
        };

        let response = match self.api.login(&request).await {
            Ok(response) => response,
            Err(e) => {
                crate::log_warn!("Login failed: {}", e);
                return LoginOutcome::Failed {
                    error: e.user_message(LOGIN_FAILED),
                };
            }
        };

        if response.requires_2fa {
            crate::log_info!("Login requires a second factor");
            return LoginOutcome::TwoFactorRequired {
                temp_token: response.temp_token.unwrap_or_default(),
                message: response
                    .message
                    .unwrap_or_else(|| TWO_FACTOR_SENT.to_string()),
            };
        }

        match (response.access_token, response.user) {
            (Some(token), Some(user)) => {
                crate::log_info!("Logged in as {} ({})", user.email, user.role.as_str());
                self.auth.establish(token, user.clone());
                LoginOutcome::Authenticated(user)
            }
            _ => {
                crate::log_error!("Login response without credential or identity");
                LoginOutcome::Failed {
                    error: response.message.unwrap_or_else(|| LOGIN_FAILED.to_string()),
                }
            }
        }
    }

    /// Best-effort backend logout; the local session is always cleared.
    pub async fn logout(&self) {
        if let Err(e) = self.api.logout().await {
            crate::log_warn!("Backend logout failed: {}", e);
        }
        self.auth.clear();
        crate::log_info!("Logged out");
    }

    pub async fn refresh_session(&self) -> bool {
        self.verify_session().await
    }

    /// Verify now, then every `period` while a credential is present.
    pub fn start_monitor(self: &Arc<Self>, period: Duration) -> SessionMonitor {
        let store = Arc::clone(self);
        let task = tokio::spawn(async move {
            store.verify_session().await;

            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if store.auth.token().is_some() {
                    store.verify_session().await;
                }
            }
        });
        SessionMonitor { task }
    }
}

/// Handle to the periodic verification task; the task stops with it.
pub struct SessionMonitor {
    task: JoinHandle<()>,
}

impl SessionMonitor {
    pub fn stop(self) {}
}

impl Drop for SessionMonitor {
    fn drop(&mut self) {
        self.task.abort();
    }
}
