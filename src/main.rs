//! Storybook Engine - Illustrated storybook builder
//!
//! The Engine is the backend server that:
//! - Splits generated children's stories into illustrated sections
//! - Generates illustrations with OpenAI or ComfyUI, falling back to placeholder art
//! - Assembles a paginated PDF with a contents page and the full story
//! - Stores the result in object storage or a local scratch directory

mod application;
mod domain;
mod infrastructure;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{routing::get, Router};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::infrastructure::config::AppConfig;
use crate::infrastructure::http;
use crate::infrastructure::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "storybook_engine=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Storybook Engine");

    // Load configuration
    let config = AppConfig::from_env()?;
    tracing::info!("Configuration loaded");
    tracing::info!(
        "  Generation: {}",
        if config.generation.is_remote_available() {
            config.generation.base_url.as_str()
        } else {
            "placeholders only"
        }
    );
    if let Some(comfyui) = &config.comfyui {
        tracing::info!("  ComfyUI: {}", comfyui.base_url);
    }
    match &config.storage {
        Some(storage) => tracing::info!("  Storage: {} ({})", storage.base_url, storage.bucket),
        None => tracing::info!("  Storage: {}", config.scratch_dir.display()),
    }

    let port = config.server_port;

    // Initialize application state
    let state = AppState::new(config)?;
    let state = Arc::new(state);
    tracing::info!("Application state initialized");

    // Build the router
    let app = Router::new()
        .route("/health", get(health_check))
        // Merge REST API routes
        .merge(http::create_routes())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    // Start the server
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    let server = axum::serve(listener, app);

    // Wait for shutdown signal (Ctrl+C)
    tokio::select! {
        result = server => {
            if let Err(e) = result {
                tracing::error!("Server error: {}", e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown signal received");
        }
    }

    Ok(())
}

async fn health_check() -> &'static str {
    "OK"
}
