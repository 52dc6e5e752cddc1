//! Chat Relay Backend
//!
//! Serves the website chat widget and relays visitor messages to the
//! operator's Telegram chat, pushing replies back to the browser.

use chat_relay_backend::api;
use chat_relay_backend::chat::ListenerHandle;
use chat_relay_backend::config::Config;
use chat_relay_backend::state::AppState;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = Config::from_env();
    info!(?config, "Configuration loaded");

    // A missing token leaves the bridge disabled; the widget API still serves
    let state = Arc::new(AppState::from_config(&config, reqwest::Client::new()));
    let bridge = state.bridge.clone();

    if bridge.is_enabled() {
        match bridge.verify_credentials().await {
            Ok(Some(username)) => info!(bot = %username, "Telegram credentials verified"),
            Ok(None) => info!("Telegram credentials verified"),
            Err(e) => warn!(error = %e, "Could not verify Telegram credentials; polling anyway"),
        }
    }
    let listener_handle = bridge.spawn_listener();

    let addr: SocketAddr = config
        .server_addr()
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid server address {}: {}", config.server_addr(), e))?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, version = env!("CARGO_PKG_VERSION"), "Chat relay listening");

    axum::serve(listener, api::router(state))
        .with_graceful_shutdown(shutdown_signal(listener_handle))
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

/// Resolve on Ctrl+C or SIGTERM, stopping the inbound listener first
async fn shutdown_signal(listener: Option<ListenerHandle>) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    let signal = tokio::select! {
        _ = ctrl_c => "Ctrl+C",
        _ = terminate => "SIGTERM",
    };
    info!(signal = signal, "Shutting down");

    // Stop polling before in-flight requests drain
    if let Some(handle) = listener {
        handle.shutdown();
    }
}
