//! Report execution
//!
//! `POST /reports/execute` validates the request, resolves the data source,
//! hands the template and its resource directory to the renderer and
//! returns the produced document inline.

use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Router,
};
use serde::Deserialize;
use serde_json::{Map, Value};

use reportdesk_core::models::data_source::{resolve, validate_json_data};
use reportdesk_core::models::{OutputFormat, RecordKey, ValidationError};
use reportdesk_core::RenderRequest;

use crate::db::{DataSource, DataSourceRepo, DbError, ReportRepo};
use crate::http::error::ApiError;
use crate::http::extractors::{AuthUser, JsonBody};
use crate::http::server::AppState;
use crate::render::render_with_timeout;

const DATA_SOURCE_DENIED: &str = "Data Source Unauthorized or Not Found";

#[derive(Debug, Default, Deserialize)]
pub struct ExecuteRequest {
    pub report_slug: Option<String>,
    pub report_id: Option<i64>,
    pub data_source_slug: Option<String>,
    pub data_source_id: Option<i64>,
    pub format: Option<String>,
    pub parameters: Option<Value>,
    pub json_data: Option<Value>,
    #[serde(default)]
    pub debug_mode: bool,
}

/// Request fields after validation
#[derive(Debug)]
struct ExecuteInput {
    report: RecordKey,
    data_source: Option<RecordKey>,
    format: OutputFormat,
    parameters: Map<String, Value>,
    json_data: Option<Value>,
    debug: bool,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty())
}

impl ExecuteRequest {
    fn validate(self) -> Result<ExecuteInput, ValidationError> {
        let report = match (non_blank(self.report_slug), self.report_id) {
            (Some(slug), _) => RecordKey::Slug(slug),
            (None, Some(id)) => RecordKey::Id(id),
            (None, None) => return Err(ValidationError::Missing { field: "report_slug" }),
        };

        let data_source = match (non_blank(self.data_source_slug), self.data_source_id) {
            (Some(slug), _) => Some(RecordKey::Slug(slug)),
            (None, Some(id)) => Some(RecordKey::Id(id)),
            (None, None) => None,
        };

        let format = non_blank(self.format).ok_or(ValidationError::Missing { field: "format" })?;
        let format = OutputFormat::parse(&format)?;

        let mut parameters = match self.parameters {
            None | Some(Value::Null) => Map::new(),
            Some(Value::Object(map)) => map,
            Some(_) => {
                return Err(ValidationError::InvalidFormat {
                    field: "parameters",
                    reason: "must be an object",
                })
            }
        };
        // Templates read the requested format as `$P{type}`
        parameters.insert("type".to_owned(), Value::String(format.as_str().to_owned()));

        let json_data = match self.json_data {
            None | Some(Value::Null) => None,
            Some(value) => {
                validate_json_data(&value)?;
                Some(value)
            }
        };

        Ok(ExecuteInput {
            report,
            data_source,
            format,
            parameters,
            json_data,
            debug: self.debug_mode,
        })
    }
}

/// The data source named in the request, if any.
///
/// The report's attached source is not consulted: without an explicit
/// reference the render uses `json_data` or an empty record set.
/// Missing and foreign data sources are indistinguishable to the caller.
async fn data_source_for(
    state: &AppState,
    auth: &AuthUser,
    key: Option<&RecordKey>,
) -> Result<Option<DataSource>, ApiError> {
    let Some(key) = key else {
        return Ok(None);
    };

    match DataSourceRepo::new(&state.pool).find(key).await {
        Ok(ds) if ds.user_id == auth.id() => Ok(Some(ds)),
        Ok(_) | Err(DbError::NotFound { .. }) => Err(ApiError::forbidden(DATA_SOURCE_DENIED)),
        Err(e) => Err(e.into()),
    }
}

/// POST /reports/execute
async fn execute_report(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    JsonBody(req): JsonBody<ExecuteRequest>,
) -> Result<Response, ApiError> {
    let input = req.validate()?;

    let report = ReportRepo::new(&state.pool).find(&input.report).await?;
    auth.ensure_owns(report.user_id)?;

    let data_source = data_source_for(&state, &auth, input.data_source.as_ref()).await?;
    let stored = match &data_source {
        Some(ds) => {
            let kind = ds.kind().ok_or_else(|| {
                ApiError::internal(format!("data source {} has unknown type '{}'", ds.id, ds.kind))
            })?;
            Some((kind, &ds.configuration.0))
        }
        None => None,
    };
    let data = resolve(stored, input.json_data);

    let file_path = report.file_path.as_deref().ok_or_else(|| ApiError::NotFound {
        resource: "report template",
        id: report.slug.clone(),
    })?;
    let template = state.storage.path(file_path)?;
    if !tokio::fs::try_exists(&template).await.unwrap_or(false) {
        return Err(ApiError::NotFound {
            resource: "report template",
            id: report.slug.clone(),
        });
    }
    let resource_dir = template
        .parent()
        .map(PathBuf::from)
        .unwrap_or_else(|| state.storage.root().to_path_buf());

    let request = RenderRequest {
        template,
        resource_dir,
        format: input.format,
        parameters: input.parameters,
        data,
        debug: input.debug || state.config.debug,
    };

    tracing::info!(
        report_id = report.id,
        format = %input.format,
        data_source_id = data_source.as_ref().map(|ds| ds.id),
        "render started"
    );
    let rendered = render_with_timeout(
        state.renderer.as_ref(),
        request,
        state.config.render_timeout(),
    )
    .await
    .inspect_err(|e| tracing::warn!(report_id = report.id, error = %e, "render failed"))?;
    tracing::info!(
        report_id = report.id,
        size = rendered.bytes.len(),
        extension = %rendered.extension,
        "render finished"
    );

    let disposition = format!("inline; filename=\"{}.{}\"", report.slug, rendered.extension);
    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, rendered.content_type().to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        rendered.bytes,
    )
        .into_response())
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/reports/execute", post(execute_report))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn request(value: Value) -> ExecuteRequest {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn report_key_is_required() {
        let err = request(json!({"format": "pdf"})).validate().unwrap_err();
        assert_eq!(err.field(), "report_slug");
    }

    #[test]
    fn slug_wins_over_id() {
        let input = request(json!({"report_slug": "sales", "report_id": 4, "format": "pdf"}))
            .validate()
            .unwrap();
        assert_eq!(input.report, RecordKey::Slug("sales".into()));
        assert!(input.data_source.is_none());
    }

    #[test]
    fn unsupported_format_is_rejected() {
        let err = request(json!({"report_id": 1, "format": "pptx"}))
            .validate()
            .unwrap_err();
        assert!(matches!(err, ValidationError::InvalidVariant { field: "format", .. }));
    }

    #[test]
    fn parameters_must_be_an_object() {
        let err = request(json!({"report_id": 1, "format": "pdf", "parameters": [1, 2]}))
            .validate()
            .unwrap_err();
        assert_eq!(err.field(), "parameters");
    }

    #[test]
    fn json_data_must_be_structured() {
        let err = request(json!({"report_id": 1, "format": "pdf", "json_data": "rows"}))
            .validate()
            .unwrap_err();
        assert_eq!(err.field(), "json_data");

        let input = request(json!({
            "report_id": 1,
            "format": "xlsx",
            "json_data": [{"n": 1}],
            "debug_mode": true
        }))
        .validate()
        .unwrap();
        assert_eq!(input.format, OutputFormat::Xlsx);
        assert!(input.debug);
        assert_eq!(input.json_data, Some(json!([{"n": 1}])));
    }

    #[test]
    fn format_is_passed_as_type_parameter() {
        let input = request(json!({
            "report_id": 1,
            "format": "html",
            "parameters": {"title": "Q1", "type": "stale"}
        }))
        .validate()
        .unwrap();
        assert_eq!(input.parameters["type"], "html");
        assert_eq!(input.parameters["title"], "Q1");
    }
}
