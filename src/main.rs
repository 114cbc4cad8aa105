/// Earthquake feed caching proxy
mod cache;
mod clients;
mod config;
mod domain;
mod errors;
mod geo;
mod handlers;
mod parser;
mod routes;
mod services;
mod utils;

use crate::cache::FeedCache;
use crate::clients::FeedClient;
use crate::config::AppConfig;
use crate::handlers::AppState;
use crate::routes::build_router;
use crate::services::QuakeService;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::from_default_env())
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);

    // Load configuration
    let config = AppConfig::from_env()?;
    info!(?config, "Configuration loaded successfully");

    // Feed client and the cache in front of it
    let client = FeedClient::new(&config.feed)?;
    let cache = FeedCache::new(
        Arc::new(client),
        Duration::from_secs(config.cache_ttl_seconds),
    );

    let state = AppState {
        quake_service: Arc::new(QuakeService::new(cache)),
    };

    let app = build_router(state);

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("quake_cache service listening on {}", addr);

    axum::serve(listener, app.into_make_service()).await?;

    Ok(())
}
