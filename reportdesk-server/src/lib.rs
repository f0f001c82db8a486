//! reportdesk-server: HTTP API for report templates and rendering
//!
//! Users upload JRXML templates, attach them to data sources and render
//! them on demand through an external Jasper-compatible engine.

pub mod auth;
pub mod config;
pub mod db;
pub mod http;
pub mod render;
pub mod storage;
pub mod tracing_setup;

pub use config::ServerConfig;
pub use http::{build_router, run_server, ApiError, AppState};
pub use render::{CommandRenderer, MockRenderer, ReportRenderer};
