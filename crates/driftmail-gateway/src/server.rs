//! HTTP server implementation using Axum.

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};
use driftmail_core::error::{DriftmailError, Result};
use driftmail_engine::NotifierEngine;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Shared state for the gateway server.
#[derive(Clone)]
pub struct AppState {
    /// The notifier engine — creates runs; the tick loop drives them.
    pub engine: Arc<NotifierEngine>,
    pub start_time: std::time::Instant,
}

impl AppState {
    pub fn new(engine: Arc<NotifierEngine>) -> Self {
        Self {
            engine,
            start_time: std::time::Instant::now(),
        }
    }
}

/// Build the Axum router with all routes.
pub fn build_router(state: AppState) -> Router {
    let shared = Arc::new(state);

    Router::new()
        .route("/api/v1/health", get(super::routes::health_check))
        .route("/api/v1/info", get(super::routes::system_info))
        .route("/api/v1/runs", get(super::routes::list_runs))
        // Signup trigger — invoked once per account creation.
        .route("/api/workflows/onboarding", post(super::routes::onboarding))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(shared)
}

/// Bind and serve the gateway.
pub async fn serve(state: AppState, host: &str, port: u16) -> Result<()> {
    let addr = format!("{host}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| DriftmailError::Engine(format!("Gateway bind {addr}: {e}")))?;
    tracing::info!("🌐 Gateway listening on http://{addr}");

    axum::serve(listener, build_router(state))
        .await
        .map_err(|e| DriftmailError::Engine(format!("Gateway serve: {e}")))?;
    Ok(())
}
