//! Report rendering through an external engine
//!
//! Provides a trait for rendering, with:
//! - Real implementation running a Jasper-compatible command line
//! - Mock implementation for testing
//! - Timeout enforcement

mod command;

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use reportdesk_core::{CoreError, RenderRequest, RenderedReport};

pub use command::CommandRenderer;

/// Error during rendering
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("renderer '{0}' not found")]
    EngineMissing(String),

    #[error("renderer exited with status {status}: {stderr}")]
    Failed { status: i32, stderr: String },

    #[error("renderer produced no output file")]
    NoOutput,

    #[error("unsupported database driver '{0}'")]
    UnsupportedDriver(String),

    #[error("render timed out after {0} seconds")]
    Timeout(u64),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Trait for report rendering (testable)
#[async_trait]
pub trait ReportRenderer: Send + Sync {
    async fn render(&self, request: RenderRequest) -> Result<RenderedReport, RenderError>;
}

/// Render with a deadline; the engine is abandoned when it expires.
pub async fn render_with_timeout(
    renderer: &dyn ReportRenderer,
    request: RenderRequest,
    timeout: Duration,
) -> Result<RenderedReport, RenderError> {
    match tokio::time::timeout(timeout, renderer.render(request)).await {
        Ok(result) => result,
        Err(_) => Err(RenderError::Timeout(timeout.as_secs())),
    }
}

/// Mock renderer for testing
///
/// Records every request. Returns queued results first, then a small
/// document in the requested format.
#[derive(Default)]
pub struct MockRenderer {
    requests: Mutex<Vec<RenderRequest>>,
    responses: Mutex<VecDeque<Result<RenderedReport, String>>>,
}

impl MockRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful result
    pub fn add_response(&self, report: RenderedReport) {
        self.lock_responses().push_back(Ok(report));
    }

    /// Queue a failure with the given engine message
    pub fn add_failure(&self, message: impl Into<String>) {
        self.lock_responses().push_back(Err(message.into()));
    }

    /// Requests received so far
    pub fn requests(&self) -> Vec<RenderRequest> {
        self.requests
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn lock_responses(&self) -> std::sync::MutexGuard<'_, VecDeque<Result<RenderedReport, String>>> {
        self.responses
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl ReportRenderer for MockRenderer {
    async fn render(&self, request: RenderRequest) -> Result<RenderedReport, RenderError> {
        let format = request.format;
        self.requests
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(request);

        match self.lock_responses().pop_front() {
            Some(Ok(report)) => Ok(report),
            Some(Err(stderr)) => Err(RenderError::Failed { status: 1, stderr }),
            None => Ok(RenderedReport {
                bytes: format!("rendered {format}").into_bytes(),
                extension: format.as_str().to_owned(),
            }),
        }
    }
}
