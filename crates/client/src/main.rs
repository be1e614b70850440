//! GetYourShare client daemon.
//!
//! Restores the persisted session, keeps the notification socket connected
//! and logs every notification until interrupted.

use anyhow::Result;
use getyourshare_client::app::AppContext;
use getyourshare_client::config::ClientConfig;
use getyourshare_client::logging;
use getyourshare_client::session::LoginOutcome;
use getyourshare_client::{log_info, log_warn};
use tokio::sync::broadcast::error::RecvError;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    logging::init("getyourshare_client=debug");

    let config = ClientConfig::from_env();
    let app = AppContext::new(config);

    match app.api.health().await {
        Some(health) => log_info!("Backend is up: {}", health),
        None => log_warn!("Backend health check failed; continuing"),
    }

    // Optional non-interactive login
    if let (Ok(email), Ok(password)) = (
        std::env::var("GETYOURSHARE_EMAIL"),
        std::env::var("GETYOURSHARE_PASSWORD"),
    ) {
        match app.session.login(&email, &password).await {
            LoginOutcome::Authenticated(user) => {
                log_info!("Signed in as {}", user.display_name())
            }
            LoginOutcome::TwoFactorRequired { message, .. } => {
                anyhow::bail!("Second factor required: {message}")
            }
            LoginOutcome::Failed { error } => anyhow::bail!("Login failed: {error}"),
        }
    }

    let mut notifications = app.notifications.subscribe();
    let runtime = app.start();
    log_info!("Listening for notifications; press Ctrl+C to exit");

    loop {
        tokio::select! {
            received = notifications.recv() => match received {
                Ok(n) => log_info!("[{}] {}", n.severity.as_str(), n.message),
                Err(RecvError::Lagged(skipped)) => {
                    log_warn!("Skipped {} notifications", skipped)
                }
                Err(RecvError::Closed) => break,
            },
            signal = tokio::signal::ctrl_c() => {
                signal?;
                log_info!("Shutting down");
                break;
            }
        }
    }

    drop(runtime);
    app.stop();
    Ok(())
}
