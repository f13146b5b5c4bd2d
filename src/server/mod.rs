//! HTTP front end for patch runs.
//!
//! | Route                          | Purpose                                  |
//! |--------------------------------|------------------------------------------|
//! | `GET /health`                  | liveness                                 |
//! | `GET /api/patches`             | job types that can be submitted          |
//! | `POST /api/runs`               | start a run, returns `{"token": ...}`    |
//! | `GET /api/runs/{token}/output` | drain output, `{"lines": [], "done": b}` |
//!
//! Callers poll the output route until `done` is true; after that the token
//! answers 404.

pub mod api;

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::config::ServiceConfig;
use crate::jobs::FanoutService;
use api::{AppState, SharedState};

/// Configuration for the HTTP server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub dev_mode: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            dev_mode: false,
        }
    }
}

/// Build the full application router.
pub fn build_router(state: SharedState) -> Router {
    api::api_router()
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the server and run until Ctrl+C.
pub async fn start_server(config: ServerConfig, service_config: &ServiceConfig) -> Result<()> {
    let service = FanoutService::from_config(service_config);
    let patches = service
        .job_types()
        .await
        .with_context(|| format!("Failed to list patches in {}", service_config.patches_dir.display()))?;
    tracing::info!(
        patches_dir = %service_config.patches_dir.display(),
        tool = %service_config.tool,
        patches = patches.len(),
        "loaded patch directory"
    );

    let mut app = build_router(Arc::new(AppState { service }));
    if config.dev_mode {
        app = app.layer(CorsLayer::permissive());
    }

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    let local_addr = listener.local_addr()?;
    tracing::info!("fanout listening on http://{}", local_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    tracing::info!("server shut down gracefully");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to install Ctrl+C handler");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}
