//! Native WebSocket implementation using tokio-tungstenite.

use std::sync::{Arc, Mutex};

use futures_channel::mpsc::{unbounded, UnboundedReceiver};
use futures_util::{SinkExt, StreamExt};
use getyourshare_shared::ClientMessage;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message};

use super::{ConnectionListener, ConnectionState, ReconnectConfig, WsHandle};

type UrlBuilder = Arc<dyn Fn() -> Option<String> + Send + Sync>;

/// The managed notification socket.
///
/// Created idle; [`WsConnection::start`] spawns the connection loop, which
/// reconnects with backoff until the reconnect budget runs out. Dropping the
/// connection stops the loop.
pub struct WsConnection {
    handle: WsHandle,
    /// Taken by the loop when it starts
    receiver: Mutex<Option<UnboundedReceiver<ClientMessage>>>,
    reconnect_config: ReconnectConfig,
    /// URL builder function (called on each reconnect attempt)
    url_builder: UrlBuilder,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl WsConnection {
    pub fn new(
        url_builder: impl Fn() -> Option<String> + Send + Sync + 'static,
        reconnect_config: ReconnectConfig,
    ) -> Self {
        let (sender, receiver) = unbounded();
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        let url_builder: UrlBuilder = Arc::new(url_builder);
        let url = url_builder().unwrap_or_default();

        Self {
            handle: WsHandle::new(sender, Arc::new(state), url),
            receiver: Mutex::new(Some(receiver)),
            reconnect_config,
            url_builder,
            task: Mutex::new(None),
        }
    }

    /// Connection to a fixed URL.
    pub fn to_url(url: impl Into<String>, reconnect_config: ReconnectConfig) -> Self {
        let url = url.into();
        Self::new(move || Some(url.clone()), reconnect_config)
    }

    /// Get a handle for sending messages
    pub fn handle(&self) -> WsHandle {
        self.handle.clone()
    }

    /// Spawn the connection loop; later calls are no-ops.
    pub fn start(&self, listener: Arc<dyn ConnectionListener>) {
        let receiver = self.receiver.lock().ok().and_then(|mut r| r.take());
        let Some(receiver) = receiver else {
            crate::log_warn!("Connection loop for {} already started", self.handle.url);
            return;
        };

        let task = tokio::spawn(connection_loop(
            self.handle.clone(),
            receiver,
            self.url_builder.clone(),
            listener,
            self.reconnect_config.clone(),
        ));
        if let Ok(mut slot) = self.task.lock() {
            *slot = Some(task);
        }
    }

    /// Stop the loop and mark the connection disconnected.
    pub fn stop(&self) {
        if let Some(task) = self.task.lock().ok().and_then(|mut t| t.take()) {
            task.abort();
            self.handle.set_state(ConnectionState::Disconnected);
        }
    }
}

impl Drop for WsConnection {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn connection_loop(
    handle: WsHandle,
    mut outbound: UnboundedReceiver<ClientMessage>,
    url_builder: UrlBuilder,
    listener: Arc<dyn ConnectionListener>,
    reconnect_config: ReconnectConfig,
) {
    let mut attempt = 0u32;

    loop {
        // Build URL
        let Some(url) = url_builder() else {
            handle.set_state(ConnectionState::Disconnected);
            // Wait a bit and try again
            tokio::time::sleep(tokio::time::Duration::from_millis(1000)).await;
            continue;
        };

        if attempt == 0 {
            handle.set_state(ConnectionState::Connecting);
        } else {
            handle.set_state(ConnectionState::Reconnecting { attempt });
        }

        match connect_async(url.as_str()).await {
            Ok((ws_stream, _response)) => {
                attempt = 0;
                crate::log_info!("WebSocket connected to {}", url);
                handle.set_state(ConnectionState::Connected);
                listener.on_open();

                let (mut write, mut read) = ws_stream.split();
                let mut senders_alive = true;

                loop {
                    tokio::select! {
                        frame = read.next() => match frame {
                            Some(Ok(Message::Text(text))) => {
                                crate::log_debug!("WebSocket received: {}", text.as_str());
                                listener.on_text(text.as_str());
                            }
                            Some(Ok(Message::Close(_))) => {
                                crate::log_info!("WebSocket to {} received close frame", url);
                                break;
                            }
                            Some(Ok(Message::Ping(data))) => {
                                // Pong is handled automatically by tungstenite
                                crate::log_debug!("Received ping: {:?}", data);
                            }
                            Some(Ok(_)) => {
                                // Ignore binary, pong, etc.
                            }
                            Some(Err(e)) => {
                                crate::log_error!("WebSocket read error: {}", e);
                                listener.on_error(&e.to_string());
                                break;
                            }
                            None => break,
                        },
                        msg = outbound.next() => match msg {
                            Some(msg) => match serde_json::to_string(&msg) {
                                Ok(json) => {
                                    crate::log_debug!("Sending to {}: {}", url, json);
                                    if let Err(e) = write.send(Message::Text(json.into())).await {
                                        crate::log_error!("Send failed: {}", e);
                                        listener.on_error(&e.to_string());
                                        break;
                                    }
                                }
                                Err(e) => {
                                    crate::log_error!("Serialize failed: {}", e);
                                    listener.on_error(&e.to_string());
                                }
                            },
                            None => {
                                // Every handle dropped
                                senders_alive = false;
                                break;
                            }
                        },
                    }
                }

                crate::log_info!("WebSocket to {} closed", url);
                handle.set_state(ConnectionState::Disconnected);
                listener.on_close();

                if !senders_alive {
                    crate::log_info!("No handles left, stopping connection loop");
                    return;
                }
            }
            Err(e) => {
                crate::log_error!("WebSocket error for {}: {}", url, e);
                listener.on_error(&e.to_string());
            }
        }

        // Check if we should retry
        if reconnect_config.exhausted(attempt) {
            handle.set_state(ConnectionState::Failed {
                reason: format!(
                    "Max reconnect attempts ({}) exceeded",
                    reconnect_config.max_attempts
                ),
            });
            return;
        }

        // Wait before reconnecting
        let delay = reconnect_config.delay_for_attempt(attempt);
        crate::log_info!(
            "Reconnecting to {} in {}ms (attempt {})",
            url,
            delay,
            attempt + 1
        );
        tokio::time::sleep(tokio::time::Duration::from_millis(delay as u64)).await;
        attempt += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::net::TcpListener;

    #[derive(Default)]
    struct Recorder {
        opened: AtomicUsize,
        closed: AtomicUsize,
        errors: AtomicUsize,
        frames: Mutex<Vec<String>>,
    }

    impl ConnectionListener for Recorder {
        fn on_open(&self) {
            self.opened.fetch_add(1, Ordering::SeqCst);
        }

        fn on_text(&self, text: &str) {
            self.frames.lock().unwrap().push(text.to_string());
        }

        fn on_close(&self) {
            self.closed.fetch_add(1, Ordering::SeqCst);
        }

        fn on_error(&self, _error: &str) {
            self.errors.fetch_add(1, Ordering::SeqCst);
        }
    }

    async fn wait_for(mut rx: watch::Receiver<ConnectionState>, want: fn(&ConnectionState) -> bool) {
        tokio::time::timeout(Duration::from_secs(5), rx.wait_for(want))
            .await
            .expect("state not reached")
            .unwrap();
    }

    #[tokio::test]
    async fn test_exchanges_frames_with_server() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
            ws.send(Message::Text(
                r#"{"type":"sale_created","data":{"amount":12}}"#.to_string().into(),
            ))
            .await
            .unwrap();
            // First client frame is the authenticate message
            match ws.next().await {
                Some(Ok(Message::Text(text))) => text.as_str().to_string(),
                other => panic!("unexpected frame: {other:?}"),
            }
        });

        let recorder = Arc::new(Recorder::default());
        let connection = WsConnection::to_url(format!("ws://{addr}/ws"), ReconnectConfig::default());
        let handle = connection.handle();
        connection.start(recorder.clone());

        wait_for(handle.subscribe_state(), ConnectionState::is_connected).await;
        handle.authenticate("42").unwrap();

        let received = tokio::time::timeout(Duration::from_secs(5), server)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(received, r#"{"type":"auth","user_id":"42"}"#);
        assert_eq!(recorder.opened.load(Ordering::SeqCst), 1);

        // Server went away: the loop reports the close and starts retrying
        wait_for(handle.subscribe_state(), |s| !s.is_connected()).await;
        assert_eq!(recorder.closed.load(Ordering::SeqCst), 1);
        assert_eq!(
            recorder.frames.lock().unwrap().clone(),
            vec![r#"{"type":"sale_created","data":{"amount":12}}"#.to_string()]
        );
    }

    #[tokio::test]
    async fn test_gives_up_after_budget() {
        // Bind then drop to get a port nobody listens on
        let addr = {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap()
        };
        let config = ReconnectConfig {
            max_attempts: 2,
            initial_delay_ms: 10,
            max_delay_ms: 20,
            backoff_multiplier: 2.0,
        };

        let recorder = Arc::new(Recorder::default());
        let connection = WsConnection::to_url(format!("ws://{addr}/ws"), config);
        let handle = connection.handle();
        connection.start(recorder.clone());

        wait_for(handle.subscribe_state(), |s| {
            matches!(s, ConnectionState::Failed { .. })
        })
        .await;
        assert_eq!(recorder.errors.load(Ordering::SeqCst), 3);
        assert_eq!(recorder.opened.load(Ordering::SeqCst), 0);
    }
}
