//! HTTP/WebSocket front-end (C8/C9) and process supervisor (C11).
//!
//! [`build_router`] wires every handler onto one `Arc<AppState>`;
//! [`serve`] binds it, serves until a shutdown signal arrives, and
//! drains in-flight requests within the configured grace period before
//! returning.

mod routes;
mod state;
mod ws;

pub use state::AppState;

use axum::routing::{get, post};
use axum::Router;
use sentinel_core::{Sentinel, SentinelConfig};
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Assembles the full router over `state`. Split out from [`serve`] so
/// tests can drive it directly with `tower::ServiceExt::oneshot`
/// without binding a real socket.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(routes::root))
        .route("/health", get(routes::health))
        .route("/api/v1/falco/webhook", post(routes::webhook))
        .route("/api/v1/simulate", post(routes::simulate))
        .route("/api/v1/threats", get(routes::list_threats))
        .route("/api/v1/threats/:id", get(routes::get_threat))
        .route("/api/v1/threats/:id/resolve", post(routes::resolve_threat))
        .route("/api/v1/actions", get(routes::list_actions))
        .route("/api/v1/actions/:id", get(routes::get_action))
        .route("/api/v1/explain/:threat_id", get(routes::explain))
        .route("/api/v1/stream", get(ws::stream))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Builds the pipeline from `config`, binds `config.bind_addr`, and
/// serves until ctrl-c/SIGTERM. The Supervisor (C11): on signal, stops
/// accepting new connections and drains in-flight requests, but only
/// up to `config.shutdown_grace_secs` - past that deadline it returns
/// anyway rather than hanging on a stuck connection.
pub async fn serve(config: SentinelConfig) -> anyhow::Result<()> {
    let sentinel = Sentinel::new(&config).await;
    let state = AppState::new(sentinel);
    let router = build_router(state);

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    tracing::info!(addr = %config.bind_addr, "sentinel-server listening");

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
    let server_task = tokio::spawn(async move {
        axum::serve(listener, router)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
            })
            .await
    });

    wait_for_signal().await;
    tracing::info!("shutdown signal received, draining in-flight requests");
    let _ = shutdown_tx.send(());

    match tokio::time::timeout(Duration::from_secs(config.shutdown_grace_secs), server_task).await {
        Ok(Ok(Ok(()))) => tracing::info!("sentinel-server shut down cleanly"),
        Ok(Ok(Err(err))) => return Err(err.into()),
        Ok(Err(join_err)) => return Err(join_err.into()),
        Err(_) => tracing::warn!(grace_secs = config.shutdown_grace_secs, "shutdown grace period elapsed, exiting anyway"),
    }

    Ok(())
}

/// Resolves on ctrl-c, or SIGTERM on unix.
async fn wait_for_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install ctrl-c handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
