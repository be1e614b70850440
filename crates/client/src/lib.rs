//! GetYourShare client core.
//!
//! Session handling, the authenticated REST adapter, the real-time
//! notification channel and the page controllers built on top of them.

pub mod logging;

pub mod api_client;
pub mod app;
pub mod auth_session;
pub mod config;
pub mod http;
pub mod notifications;
pub mod query_cache;
pub mod reconcile;
pub mod routes;
pub mod session;
pub mod storage;
pub mod view;
pub mod ws;

#[cfg(test)]
pub(crate) mod testing;

pub use api_client::ApiClient;
pub use app::{AppContext, AppRuntime};
pub use auth_session::{AuthSession, Session, SessionStatus};
pub use config::ClientConfig;
pub use notifications::{Notification, NotificationCenter, Notifier, Severity};
pub use query_cache::{QueryCache, QueryKey};
pub use routes::Route;
pub use session::{LoginOutcome, SessionStore};
