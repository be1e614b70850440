//! Process-wide wiring.
//!
//! [`AppContext`] builds every shared service exactly once; [`AppRuntime`]
//! owns the background work started from it (session monitor, socket loop,
//! auth watcher, reconciliation handlers) and stops all of it when dropped.

use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::api_client::ApiClient;
use crate::auth_session::AuthSession;
use crate::config::ClientConfig;
use crate::http::ReqwestTransport;
use crate::notifications::{NotificationCenter, Notifier};
use crate::query_cache::QueryCache;
use crate::reconcile;
use crate::routes::{History, Route};
use crate::session::{SessionMonitor, SessionStore};
use crate::storage::{FileStore, KeyValueStore, MemoryStore};
use crate::view::ViewContext;
use crate::ws::{ChannelCallbacks, RealtimeChannel, Subscription, WsConnection};

pub struct AppContext {
    pub config: ClientConfig,
    pub storage: Arc<dyn KeyValueStore>,
    pub auth: Arc<AuthSession>,
    pub history: Arc<History>,
    pub api: ApiClient,
    pub session: Arc<SessionStore>,
    pub notifications: Arc<NotificationCenter>,
    pub cache: Arc<QueryCache>,
    pub connection: WsConnection,
    pub channel: Arc<RealtimeChannel>,
}

impl AppContext {
    pub fn new(config: ClientConfig) -> Self {
        let storage: Arc<dyn KeyValueStore> = match &config.storage_dir {
            Some(dir) => Arc::new(FileStore::new(dir)),
            None => {
                crate::log_warn!("No storage directory; the session will not persist");
                Arc::new(MemoryStore::new())
            }
        };
        Self::with_storage(config, storage)
    }

    /// Build against an explicit storage backend.
    pub fn with_storage(config: ClientConfig, storage: Arc<dyn KeyValueStore>) -> Self {
        let auth = Arc::new(AuthSession::new(storage.clone()));
        let history = Arc::new(History::new(Route::Home));
        let api = ApiClient::new()
            .with_base_url(&config.backend_url)
            .with_transport(Arc::new(ReqwestTransport::new()))
            .with_session(auth.clone())
            .with_navigator(history.clone());
        let session = Arc::new(SessionStore::new(auth.clone(), api.clone()));
        let notifications = Arc::new(NotificationCenter::new());
        let cache = Arc::new(QueryCache::new());

        let connection = WsConnection::to_url(config.ws_url.clone(), config.reconnect.clone());
        let on_open = notifications.clone();
        let on_close = notifications.clone();
        let callbacks = ChannelCallbacks::default()
            .on_open(move || on_open.info("Connecté au serveur de notifications"))
            .on_close(move || on_close.warning("Déconnecté du serveur de notifications"));
        let channel = Arc::new(RealtimeChannel::new(connection.handle(), callbacks));

        crate::log_info!(
            "Client configured for {} (socket {})",
            config.backend_url,
            config.ws_url
        );

        Self {
            config,
            storage,
            auth,
            history,
            api,
            session,
            notifications,
            cache,
            connection,
            channel,
        }
    }

    /// Services handed to page controllers.
    pub fn view_context(&self) -> ViewContext {
        ViewContext {
            api: self.api.clone(),
            auth: self.auth.clone(),
            notifier: self.notifications.clone(),
            cache: self.cache.clone(),
            storage: self.storage.clone(),
            navigator: self.history.clone(),
        }
    }

    /// Start the background work. Everything stops when the returned
    /// runtime is dropped.
    pub fn start(&self) -> AppRuntime {
        let subscriptions = reconcile::install(
            &self.channel,
            self.auth.clone(),
            self.notifications.clone(),
            self.cache.clone(),
        );
        let auth_watcher = self.channel.spawn_auth_watcher(self.auth.subscribe());
        self.connection.start(self.channel.clone());
        let monitor = self
            .session
            .start_monitor(self.config.session_check_interval);

        AppRuntime {
            monitor: Some(monitor),
            auth_watcher,
            subscriptions,
        }
    }

    pub fn stop(&self) {
        self.connection.stop();
    }
}

pub struct AppRuntime {
    monitor: Option<SessionMonitor>,
    auth_watcher: JoinHandle<()>,
    subscriptions: Vec<Subscription>,
}

impl AppRuntime {
    pub fn handler_count(&self) -> usize {
        self.subscriptions.len()
    }
}

impl Drop for AppRuntime {
    fn drop(&mut self) {
        self.auth_watcher.abort();
        if let Some(monitor) = self.monitor.take() {
            monitor.stop();
        }
        self.subscriptions.clear();
    }
}
