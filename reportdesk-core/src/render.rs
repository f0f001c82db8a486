//! Render requests handed to the external report engine
//!
//! The resource directory travels with each request so that concurrent
//! renders resolve subreports against their own report's directory.

use std::path::PathBuf;

use serde_json::{Map, Value};

use crate::models::{content_type_for, OutputFormat, ResolvedData};

/// One render of a stored template
#[derive(Debug, Clone)]
pub struct RenderRequest {
    /// Absolute path of the main template
    pub template: PathBuf,
    /// Directory the engine resolves relative subreport paths against
    pub resource_dir: PathBuf,
    pub format: OutputFormat,
    /// Report parameters, by name
    pub parameters: Map<String, Value>,
    pub data: ResolvedData,
    pub debug: bool,
}

impl RenderRequest {
    /// Parameters as `name=value` pairs; strings are passed verbatim,
    /// everything else as compact JSON.
    pub fn parameter_pairs(&self) -> Vec<(String, String)> {
        self.parameters
            .iter()
            .filter(|(_, v)| !v.is_null())
            .map(|(k, v)| {
                let value = match v {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                (k.clone(), value)
            })
            .collect()
    }
}

/// Output of a successful render
#[derive(Debug, Clone)]
pub struct RenderedReport {
    pub bytes: Vec<u8>,
    /// Extension of the file the engine produced
    pub extension: String,
}

impl RenderedReport {
    pub fn content_type(&self) -> &'static str {
        content_type_for(&self.extension)
    }
}
