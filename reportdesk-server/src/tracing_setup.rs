//! Tracing setup for the reportdesk server
//!
//! Usage:
//!   reportdesk --debug                  # Debug logging to console
//!   RUST_LOG=reportdesk_server=debug    # Fine-grained log control

use anyhow::{anyhow, Result};
use tracing_subscriber::EnvFilter;

/// Initialize console tracing.
///
/// `RUST_LOG` wins when set; otherwise `debug` or `info`.
pub fn init(debug: bool) -> Result<()> {
    let default_level = if debug { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(debug) // Show targets in debug mode
        .compact()
        .try_init()
        .map_err(|err| anyhow!(err))
}
