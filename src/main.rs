//! Storyteller Engine - Backend for co-authoring illustrated children's storybooks
//!
//! The Engine is the backend server that:
//! - Stores story projects as JSON folders on disk
//! - Guides story creation through a conversation with a local LLM (Ollama)
//! - Generates page illustrations with FLUX through ComfyUI

mod application;
mod domain;
mod infrastructure;

use std::net::SocketAddr;
use std::sync::Arc;

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
                .unwrap_or_else(|_| "storyteller_engine=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Storyteller Engine");

    // Load configuration
    let config = AppConfig::from_env()?;
    tracing::info!("Configuration loaded");
    tracing::info!("  Stories: {}", config.stories_dir.display());
    tracing::info!("  LLM backend: {:?}", config.llm_backend);
    tracing::info!("  Ollama: {} ({})", config.ollama_base_url, config.ollama_model);
    tracing::info!("  ComfyUI: {}", config.comfyui_base_url);
    tracing::info!(
        "  Image model: {} (q{}, {} steps)",
        config.image_config.model().as_str(),
        config.image_config.quantize().bits(),
        config.image_config.steps()
    );

    let port = config.server_port;

    // Initialize application state
    let state = AppState::new(config).await?;
    let state = Arc::new(state);
    tracing::info!("Application state initialized");

    // Build the router
    let app = http::create_routes()
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(Arc::clone(&state));

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
            if let Some(generator) = state.generators.current() {
                generator.cancel();
                tracing::info!("Pending illustration cancelled");
            }
        }
    }

    Ok(())
}
