//! Client configuration from environment variables.

use std::path::PathBuf;
use std::time::Duration;

use crate::ws::ReconnectConfig;

/// Default backend when `GETYOURSHARE_BACKEND_URL` is unset.
pub const DEFAULT_BACKEND_URL: &str = "http://localhost:8000";

/// Session re-verification period (5 minutes).
pub const DEFAULT_SESSION_CHECK_INTERVAL: Duration = Duration::from_millis(300_000);

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// REST base URL, without trailing slash.
    pub backend_url: String,
    /// WebSocket endpoint for real-time notifications.
    pub ws_url: String,
    pub session_check_interval: Duration,
    /// Directory holding the persisted session entries.
    pub storage_dir: Option<PathBuf>,
    pub reconnect: ReconnectConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::for_backend(DEFAULT_BACKEND_URL)
    }
}

impl ClientConfig {
    /// Configuration for `backend_url` with every other setting defaulted.
    pub fn for_backend(backend_url: &str) -> Self {
        let backend_url = backend_url.trim_end_matches('/').to_string();
        Self {
            ws_url: ws_url_for(&backend_url),
            backend_url,
            session_check_interval: DEFAULT_SESSION_CHECK_INTERVAL,
            storage_dir: dirs::config_dir().map(|dir| dir.join("getyourshare")),
            reconnect: ReconnectConfig::default(),
        }
    }

    /// Read configuration from the environment.
    ///
    /// Environment variables:
    /// - `GETYOURSHARE_BACKEND_URL`: REST base URL (default: "http://localhost:8000")
    /// - `GETYOURSHARE_WS_URL`: WebSocket URL (default: backend URL with a ws scheme + "/ws")
    /// - `GETYOURSHARE_SESSION_CHECK_MS`: session re-verification period (default: 300000)
    /// - `GETYOURSHARE_STORAGE_DIR`: session storage directory (default: platform config dir)
    pub fn from_env() -> Self {
        let backend = std::env::var("GETYOURSHARE_BACKEND_URL")
            .unwrap_or_else(|_| DEFAULT_BACKEND_URL.to_string());
        let mut config = Self::for_backend(&backend);

        if let Ok(ws_url) = std::env::var("GETYOURSHARE_WS_URL") {
            config.ws_url = ws_url;
        }

        if let Ok(raw) = std::env::var("GETYOURSHARE_SESSION_CHECK_MS") {
            match raw.parse::<u64>() {
                Ok(ms) if ms > 0 => config.session_check_interval = Duration::from_millis(ms),
                _ => crate::log_warn!(
                    "Ignoring invalid GETYOURSHARE_SESSION_CHECK_MS value '{}'",
                    raw
                ),
            }
        }

        if let Ok(dir) = std::env::var("GETYOURSHARE_STORAGE_DIR") {
            config.storage_dir = Some(PathBuf::from(dir));
        }

        config
    }
}

/// Convert an HTTP(S) backend URL into its notification socket URL.
pub fn ws_url_for(backend_url: &str) -> String {
    let base = backend_url.trim_end_matches('/');
    let ws_base = if let Some(rest) = base.strip_prefix("https://") {
        format!("wss://{rest}")
    } else if let Some(rest) = base.strip_prefix("http://") {
        format!("ws://{rest}")
    } else {
        format!("ws://{base}")
    };
    format!("{ws_base}/ws")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ws_url_for() {
        assert_eq!(ws_url_for("http://localhost:8000"), "ws://localhost:8000/ws");
        assert_eq!(
            ws_url_for("https://api.getyourshare.ma/"),
            "wss://api.getyourshare.ma/ws"
        );
        assert_eq!(ws_url_for("backend:8000"), "ws://backend:8000/ws");
    }

    #[test]
    fn test_for_backend_defaults() {
        let config = ClientConfig::for_backend("https://api.example.com/");
        assert_eq!(config.backend_url, "https://api.example.com");
        assert_eq!(config.ws_url, "wss://api.example.com/ws");
        assert_eq!(config.session_check_interval, Duration::from_secs(300));
    }
}
