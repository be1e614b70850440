//! Test doubles shared by the unit tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use getyourshare_shared::{ApiError, Role, User};
use serde_json::Value;

use crate::api_client::ApiClient;
use crate::auth_session::AuthSession;
use crate::http::{HttpRequest, HttpResponse, HttpTransport, Method};
use crate::notifications::{NotificationCenter, Severity};
use crate::query_cache::QueryCache;
use crate::routes::{History, Route};
use crate::storage::MemoryStore;
use crate::view::ViewContext;

pub const BASE_URL: &str = "http://test.local";

pub fn user(id: &str, role: Role) -> User {
    User {
        id: id.to_string(),
        email: format!("user{id}@example.com"),
        role,
        first_name: Some("Amina".to_string()),
        last_name: Some("Benali".to_string()),
        phone: Some("+212600000000".to_string()),
    }
}

/// Client wired to the mock transport, the session and the history.
pub fn api_client(
    transport: &Arc<MockTransport>,
    auth: &Arc<AuthSession>,
    history: &Arc<History>,
) -> ApiClient {
    ApiClient::new()
        .with_base_url(BASE_URL)
        .with_transport(transport.clone())
        .with_session(auth.clone())
        .with_navigator(history.clone())
}

/// Every service a page controller needs, backed by test doubles.
pub struct ViewFixture {
    pub transport: Arc<MockTransport>,
    pub storage: Arc<MemoryStore>,
    pub history: Arc<History>,
    pub notifications: Arc<NotificationCenter>,
    pub cache: Arc<QueryCache>,
    pub ctx: ViewContext,
}

impl ViewFixture {
    pub fn new(start: Route) -> Self {
        let transport = MockTransport::new();
        let storage = Arc::new(MemoryStore::new());
        let auth = Arc::new(AuthSession::new(storage.clone()));
        let history = Arc::new(History::new(start));
        let notifications = Arc::new(NotificationCenter::new());
        let cache = Arc::new(QueryCache::new());
        let ctx = ViewContext {
            api: api_client(&transport, &auth, &history),
            auth,
            notifier: notifications.clone(),
            cache: cache.clone(),
            storage: storage.clone(),
            navigator: history.clone(),
        };
        Self {
            transport,
            storage,
            history,
            notifications,
            cache,
            ctx,
        }
    }

    pub fn login_as(&self, id: &str, role: Role) -> User {
        let user = user(id, role);
        self.ctx.auth.establish("tok".to_string(), user.clone());
        user
    }

    /// Raised notifications as (severity, message), oldest first.
    pub fn messages(&self) -> Vec<(Severity, String)> {
        self.notifications
            .history()
            .into_iter()
            .map(|n| (n.severity, n.message))
            .collect()
    }
}

#[derive(Clone)]
enum Stub {
    Reply { status: u16, body: String },
    Fail(ApiError),
}

/// Scripted transport. Requests are matched on method and path (query
/// included, base URL stripped); anything unscripted answers 404.
#[derive(Default)]
pub struct MockTransport {
    stubs: Mutex<HashMap<(Method, String), Stub>>,
    delays: Mutex<HashMap<(Method, String), Duration>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl MockTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn respond(&self, method: Method, path: &str, status: u16, body: Value) {
        self.respond_raw(method, path, status, &body.to_string());
    }

    pub fn respond_raw(&self, method: Method, path: &str, status: u16, body: &str) {
        self.stubs.lock().unwrap().insert(
            (method, path.to_string()),
            Stub::Reply {
                status,
                body: body.to_string(),
            },
        );
    }

    pub fn fail(&self, method: Method, path: &str, error: ApiError) {
        self.stubs
            .lock()
            .unwrap()
            .insert((method, path.to_string()), Stub::Fail(error));
    }

    /// Hold the answer to this request for `delay` (use with paused time).
    pub fn delay(&self, method: Method, path: &str, delay: Duration) {
        self.delays
            .lock()
            .unwrap()
            .insert((method, path.to_string()), delay);
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn calls(&self, method: Method, path: &str) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.method == method && relative(&r.url) == path)
            .count()
    }

    /// Decoded JSON body of the last request to `path`.
    pub fn last_body(&self, method: Method, path: &str) -> Option<Value> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|r| r.method == method && relative(&r.url) == path)
            .and_then(|r| r.body.as_ref())
            .and_then(|b| serde_json::from_slice(b).ok())
    }
}

fn relative(url: &str) -> &str {
    url.strip_prefix(BASE_URL).unwrap_or(url)
}

#[async_trait]
impl HttpTransport for MockTransport {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, ApiError> {
        let key = (request.method.clone(), relative(&request.url).to_string());
        self.requests.lock().unwrap().push(request);

        let delay = self.delays.lock().unwrap().get(&key).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let stub = self.stubs.lock().unwrap().get(&key).cloned();
        match stub {
            Some(Stub::Reply { status, body }) => Ok(HttpResponse { status, body }),
            Some(Stub::Fail(error)) => Err(error),
            None => Ok(HttpResponse {
                status: 404,
                body: r#"{"detail":"Not Found"}"#.to_string(),
            }),
        }
    }
}
