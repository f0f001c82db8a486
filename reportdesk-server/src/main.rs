//! reportdesk - report template management and rendering API
//!
//! Loads `.env`, parses flags (each with an environment fallback), prepares
//! the database and storage, then serves the HTTP API until shutdown.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;

use reportdesk_server::db::{create_pool, migrations};
use reportdesk_server::render::CommandRenderer;
use reportdesk_server::{run_server, tracing_setup, AppState, ServerConfig};

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env is fine; flags and the environment still apply
    let dotenv = dotenvy::dotenv();
    let config = ServerConfig::parse();
    tracing_setup::init(config.debug)?;

    if let Ok(path) = dotenv {
        tracing::debug!(path = %path.display(), "loaded .env");
    }
    tracing::info!("Starting reportdesk on {}", config.bind);

    let pool = create_pool(&config.database_url)
        .await
        .context("Failed to create database pool")?;
    migrations::run(&pool)
        .await
        .context("Failed to run database migrations")?;

    tokio::fs::create_dir_all(&config.storage_root)
        .await
        .with_context(|| format!("Failed to create {}", config.storage_root.display()))?;

    let renderer = Arc::new(CommandRenderer::new(config.renderer_bin.clone()));
    let state = AppState::new(pool, renderer, config);

    // Run server (blocks until shutdown)
    run_server(state).await.context("Server error")?;

    Ok(())
}
