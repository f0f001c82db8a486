//! Server configuration
//!
//! Every flag falls back to an environment variable; `main` loads `.env`
//! with dotenvy before parsing, so deployments can keep settings there.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

/// Server command-line arguments
#[derive(Parser, Debug, Clone)]
#[command(name = "reportdesk", version, about = "Report template management and rendering API")]
pub struct ServerConfig {
    /// Address to bind to
    #[arg(long, env = "REPORTDESK_BIND", default_value = "127.0.0.1:8000")]
    pub bind: SocketAddr,

    /// SQLite connection string
    #[arg(long, env = "DATABASE_URL", default_value = "sqlite://reportdesk.db?mode=rwc")]
    pub database_url: String,

    /// Root of the private file storage holding uploaded templates
    #[arg(long, env = "REPORTDESK_STORAGE", default_value = "storage/private")]
    pub storage_root: PathBuf,

    /// Jasper-compatible command line renderer
    #[arg(long, env = "REPORTDESK_RENDERER", default_value = "jasperstarter")]
    pub renderer_bin: PathBuf,

    /// Render timeout in seconds
    #[arg(long, env = "REPORTDESK_RENDER_TIMEOUT", default_value_t = 120)]
    pub render_timeout: u64,

    /// Maximum template upload size in KiB
    #[arg(long, env = "REPORTDESK_MAX_UPLOAD_KB", default_value_t = 10240)]
    pub max_upload_kb: usize,

    /// Allow any CORS origin (default: localhost only)
    ///
    /// WARNING: only for development setups.
    #[arg(long, env = "REPORTDESK_CORS_PERMISSIVE")]
    pub cors_permissive: bool,

    /// Debug logging
    #[arg(long)]
    pub debug: bool,
}

impl ServerConfig {
    pub fn render_timeout(&self) -> Duration {
        Duration::from_secs(self.render_timeout)
    }

    pub fn max_upload_bytes(&self) -> usize {
        self.max_upload_kb.saturating_mul(1024)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([127, 0, 0, 1], 8000)),
            database_url: "sqlite://reportdesk.db?mode=rwc".to_string(),
            storage_root: PathBuf::from("storage/private"),
            renderer_bin: PathBuf::from("jasperstarter"),
            render_timeout: 120,
            max_upload_kb: 10240,
            cors_permissive: false,
            debug: false,
        }
    }
}
