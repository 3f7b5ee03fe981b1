//! HTTP server

use anyhow::{Context, Result};
use axum::{http::StatusCode, response::Json, routing::get, Router};
use orderheal_core::ServerConfig;
use orderheal_webhook::{create_webhook_router, Dispatcher};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::info;

pub struct Server {
    addr: SocketAddr,
    dispatcher: Arc<Dispatcher>,
}

impl Server {
    pub fn new(config: &ServerConfig, dispatcher: Arc<Dispatcher>) -> Result<Self> {
        let addr = format!("{}:{}", config.host, config.port)
            .parse::<SocketAddr>()
            .with_context(|| format!("Invalid listen address {}:{}", config.host, config.port))?;

        Ok(Self { addr, dispatcher })
    }

    pub async fn run(self) -> Result<()> {
        let app = build_router(self.dispatcher);

        let listener = tokio::net::TcpListener::bind(self.addr)
            .await
            .context("Failed to bind HTTP server")?;
        info!(addr = %self.addr, "HTTP server listening");

        axum::serve(listener, app.into_make_service())
            .with_graceful_shutdown(shutdown_signal())
            .await
            .context("HTTP server error")?;

        Ok(())
    }
}

pub fn build_router(dispatcher: Arc<Dispatcher>) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        .merge(create_webhook_router(dispatcher))
        .layer(TraceLayer::new_for_http())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        return;
    }
    info!("Shutdown signal received");
}

async fn root() -> Json<serde_json::Value> {
    Json(json!({
        "service": "orderheal",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "running"
    }))
}

async fn health_check() -> StatusCode {
    StatusCode::OK
}
