//! Application routes and navigation.

use std::sync::Mutex;

/// Views the client can navigate to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Home,
    Login { session_expired: bool },
    Register,
    Marketplace,
    ProductDetail { product_id: String },
    Contact,
    Dashboard,
    PaymentSettings,
    TrackingLinks,
}

impl Route {
    pub fn path(&self) -> String {
        match self {
            Route::Home => "/".to_string(),
            Route::Login {
                session_expired: true,
            } => "/login?session_expired=true".to_string(),
            Route::Login {
                session_expired: false,
            } => "/login".to_string(),
            Route::Register => "/register".to_string(),
            Route::Marketplace => "/marketplace".to_string(),
            Route::ProductDetail { product_id } => format!("/marketplace/product/{product_id}"),
            Route::Contact => "/contact".to_string(),
            Route::Dashboard => "/dashboard".to_string(),
            Route::PaymentSettings => "/settings/payments".to_string(),
            Route::TrackingLinks => "/tracking-links".to_string(),
        }
    }

    /// Parse a path (query string allowed) back into a route.
    pub fn parse(path: &str) -> Option<Route> {
        let (path, query) = match path.split_once('?') {
            Some((p, q)) => (p, Some(q)),
            None => (path, None),
        };
        let path = if path.len() > 1 {
            path.trim_end_matches('/')
        } else {
            path
        };

        let route = match path {
            "/" | "" => Route::Home,
            "/login" => Route::Login {
                session_expired: query
                    .map(|q| q.split('&').any(|pair| pair == "session_expired=true"))
                    .unwrap_or(false),
            },
            "/register" => Route::Register,
            "/marketplace" => Route::Marketplace,
            "/contact" => Route::Contact,
            "/dashboard" => Route::Dashboard,
            "/settings/payments" => Route::PaymentSettings,
            "/tracking-links" => Route::TrackingLinks,
            other => {
                let product_id = other.strip_prefix("/marketplace/product/")?;
                if product_id.is_empty() || product_id.contains('/') {
                    return None;
                }
                Route::ProductDetail {
                    product_id: product_id.to_string(),
                }
            }
        };
        Some(route)
    }

    pub fn is_login(&self) -> bool {
        matches!(self, Route::Login { .. })
    }
}

/// Where the user currently is, and how to send them elsewhere.
pub trait Navigator: Send + Sync {
    fn current_path(&self) -> String;

    fn navigate(&self, route: Route);

    fn current_route(&self) -> Option<Route> {
        Route::parse(&self.current_path())
    }

    /// Whether the user is already looking at the login view.
    fn on_login_view(&self) -> bool {
        self.current_route().is_some_and(|route| route.is_login())
    }
}

/// In-process navigation history.
#[derive(Debug)]
pub struct History {
    entries: Mutex<Vec<String>>,
}

impl History {
    pub fn new(initial: Route) -> Self {
        Self {
            entries: Mutex::new(vec![initial.path()]),
        }
    }

    /// All visited paths, oldest first.
    pub fn entries(&self) -> Vec<String> {
        self.entries.lock().map(|e| e.clone()).unwrap_or_default()
    }
}

impl Default for History {
    fn default() -> Self {
        Self::new(Route::Home)
    }
}

impl Navigator for History {
    fn current_path(&self) -> String {
        self.entries
            .lock()
            .ok()
            .and_then(|e| e.last().cloned())
            .unwrap_or_else(|| "/".to_string())
    }

    fn navigate(&self, route: Route) {
        let path = route.path();
        crate::log_debug!("Navigating to {}", path);
        if let Ok(mut entries) = self.entries.lock() {
            entries.push(path);
        }
    }
}
