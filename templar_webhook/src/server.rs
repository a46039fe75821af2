//! Webhook HTTP server.

use std::net::SocketAddr;
use std::time::Duration;
use tower_http::trace::TraceLayer;
use tracing::{debug, info};

use crate::handler::{WebhookState, webhook_router};
use crate::{Error, Result};

const CLEANUP_INTERVAL: Duration = Duration::from_secs(300);

/// Parse `host:port` into a socket address.
pub fn socket_addr(host: &str, port: u16) -> Result<SocketAddr> {
    format!("{host}:{port}")
        .parse()
        .map_err(|e| Error::Config(format!("Invalid listen address {host}:{port}: {e}")))
}

/// Serve the webhook router until Ctrl+C.
pub async fn serve(addr: SocketAddr, state: WebhookState) -> Result<()> {
    let limiter = state.rate_limiter.clone();
    let registry = state.registry.clone();
    let cleanup = tokio::spawn(async move {
        let mut interval = tokio::time::interval(CLEANUP_INTERVAL);
        loop {
            interval.tick().await;
            {
                let mut limiter = limiter.lock().await;
                limiter.cleanup();
                debug!(tracked = limiter.tracked_keys(), "Rate limiter cleanup");
            }
            let evicted = registry.evict_idle().await;
            let active = registry.active_conversations().await;
            debug!(
                evicted,
                active,
                "Conversation cleanup"
            );
        }
    });

    let app = webhook_router(state).layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Webhook server listening on http://{addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    cleanup.abort();
    info!("Webhook server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for Ctrl+C: {e}");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
