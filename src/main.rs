//! Matinee Backend - weekly playlist scheduling service
//!
//! Computes "Saturday morning" style weekly playlists from a Plex library,
//! distributing each allowed show's episodes round-robin across week buckets,
//! and keeps the server's playlists idempotently in sync with the catalog.
//! All operations are exposed via the REST API under /api.

mod api;
mod config;
mod jobs;
mod scheduler;
mod services;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;
use crate::services::{GeneratorService, PlexClient};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub catalog: Arc<PlexClient>,
    pub generator: Arc<GeneratorService<PlexClient>>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = Arc::new(Config::from_env()?);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "matinee=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Matinee backend");
    tracing::info!("Configuration loaded");

    // The catalog handle is owned here and passed down explicitly; server
    // identity inside it is resolved lazily on first playlist write.
    let catalog = Arc::new(PlexClient::new(
        config.plex_url.clone(),
        config.plex_token.clone(),
    ));

    let cancel = CancellationToken::new();
    let generator = Arc::new(GeneratorService::new(catalog.clone(), cancel.clone()));
    tracing::info!("Generator service initialized");

    let _scheduler = jobs::start_scheduler(generator.clone(), config.clone()).await?;

    let state = AppState {
        config: config.clone(),
        catalog,
        generator,
    };

    let app = Router::new()
        .merge(api::health::router())
        .nest("/api", api::schedule::router())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(cancel))
        .await?;

    Ok(())
}

/// Wait for ctrl-c, then cancel so an in-flight generation run stops at the
/// next bucket boundary instead of half-writing a playlist.
async fn shutdown_signal(cancel: CancellationToken) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        return;
    }
    tracing::info!("Shutdown signal received");
    cancel.cancel();
}
