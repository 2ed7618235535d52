mod catalog;
mod collaborator;
mod config;
mod controller;
mod error;
mod gemini;
mod models;
mod pdf;
mod prompt;
mod render;
mod routes;
mod segmenter;
mod workflow;

use anyhow::Context;
use routes::{router, AppState};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::AppConfig;
use crate::controller::Controller;
use crate::gemini::GeminiClient;

const EVICTION_INTERVAL: Duration = Duration::from_secs(300);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).init();

    let config = AppConfig::from_env();
    if config.is_demo() {
        tracing::info!("🧪 GEMINI_API_KEY not set, running in demo mode");
    } else {
        tracing::info!("Using API key: {}", config.masked_key());
    }
    tracing::info!(text = %config.text_model, image = %config.image_model, fallback = %config.image_fallback_model, "Gemini models");

    let gemini = Arc::new(GeminiClient::new(&config));
    let controller = Arc::new(
        Controller::new(gemini.clone(), gemini).with_session_ttl(chrono::Duration::minutes(config.session_ttl_minutes)),
    );
    tokio::spawn(evict_sessions(Arc::clone(&controller)));
    let state = AppState { controller };

    let app = router(state).layer(
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any),
    );

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!(%addr, "Starting server");
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;
    tracing::info!("👋 Server stopped");
    Ok(())
}

async fn evict_sessions(controller: Arc<Controller>) {
    let mut ticker = tokio::time::interval(EVICTION_INTERVAL);
    loop {
        ticker.tick().await;
        controller.evict_expired();
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}
