//! Axum server setup
//!
//! Server skeleton with:
//! - Localhost-only CORS by default
//! - Tracing middleware
//! - Request body limit sized to the upload limit
//! - Graceful shutdown on SIGTERM/Ctrl+C

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::http::HeaderValue;
use axum::Router;
use sqlx::SqlitePool;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::routes;
use crate::config::ServerConfig;
use crate::render::ReportRenderer;
use crate::storage::PrivateStorage;

/// Headroom on top of the upload limit for the other multipart fields
const FORM_OVERHEAD_BYTES: usize = 64 * 1024;

/// Origins allowed when CORS is not permissive
const LOCAL_ORIGINS: &[&str] = &[
    "http://localhost:3000",
    "http://localhost:5173",
    "http://localhost:8000",
    "http://127.0.0.1:3000",
    "http://127.0.0.1:5173",
    "http://127.0.0.1:8000",
];

/// Shared application state
pub struct AppState {
    pub pool: SqlitePool,
    pub storage: PrivateStorage,
    pub renderer: Arc<dyn ReportRenderer>,
    pub config: ServerConfig,
}

impl AppState {
    pub fn new(pool: SqlitePool, renderer: Arc<dyn ReportRenderer>, config: ServerConfig) -> Self {
        Self {
            pool,
            storage: PrivateStorage::new(config.storage_root.clone()),
            renderer,
            config,
        }
    }
}

fn cors_layer(permissive: bool) -> CorsLayer {
    if permissive {
        tracing::warn!("CORS: Permissive mode enabled - all origins allowed");
        return CorsLayer::permissive();
    }

    // Localhost only
    let origins: Vec<HeaderValue> = LOCAL_ORIGINS
        .iter()
        .map(|origin| HeaderValue::from_static(*origin))
        .collect();
    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(Any)
        .allow_headers(Any)
}

/// Build the application router.
pub fn build_router(state: Arc<AppState>) -> Router {
    let body_limit = state
        .config
        .max_upload_bytes()
        .saturating_add(FORM_OVERHEAD_BYTES);

    let api = Router::new()
        .merge(routes::auth::router())
        .merge(routes::execute::router())
        .merge(routes::reports::router())
        .merge(routes::data_sources::router());

    Router::new()
        .merge(routes::health::router())
        .nest("/api", api)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors_layer(state.config.cors_permissive))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Run the HTTP server.
///
/// # Example
///
/// ```ignore
/// let pool = create_pool(&config.database_url).await?;
/// let renderer = Arc::new(CommandRenderer::new(&config.renderer_bin));
/// run_server(AppState::new(pool, renderer, config)).await?;
/// ```
pub async fn run_server(state: AppState) -> Result<(), ServerError> {
    let bind = state.config.bind;
    tracing::info!(
        storage_root = %state.storage.root().display(),
        renderer = %state.config.renderer_bin.display(),
        "application state ready"
    );
    let app = build_router(Arc::new(state));

    // Bind listener
    let listener = TcpListener::bind(bind).await?;
    tracing::info!("Server listening on {}", bind);

    // Run with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, starting shutdown");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting shutdown");
        }
    }
}

/// Server error type
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
