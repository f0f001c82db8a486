//! Report endpoints
//!
//! Create and update take multipart forms carrying the template upload.
//! Templates live under `reports/user_{user}/report_{id}/` in private
//! storage, next to any subreports uploaded for the same report.

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use reportdesk_core::models::{
    next_free_slug, validate_name, Paginated, Pagination, Slug, TemplateUpload, ValidationError,
};

use crate::db::{DataSourceRepo, DbError, NewReport, Report, ReportFilter, ReportRepo, ReportUpdate};
use crate::http::error::ApiError;
use crate::http::extractors::{AuthUser, FilePart, FormData, ValidKey};
use crate::http::server::AppState;
use crate::storage::{parent_dir, PrivateStorage};

/// Report response
#[derive(Debug, Serialize)]
pub struct ReportResponse {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub file_path: Option<String>,
    pub data_source_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Report> for ReportResponse {
    fn from(r: Report) -> Self {
        Self {
            id: r.id,
            user_id: r.user_id,
            name: r.name,
            slug: r.slug,
            description: r.description,
            file_path: r.file_path,
            data_source_id: r.data_source_id,
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ListReportsQuery {
    pub name: Option<String>,
    pub description: Option<String>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
pub struct MethodOverride {
    #[serde(rename = "_method")]
    pub method: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SubreportResponse {
    pub message: &'static str,
    pub file_name: String,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty())
}

/// Load a report and check the caller owns it.
async fn owned_report(state: &AppState, auth: &AuthUser, key: &ValidKey) -> Result<Report, ApiError> {
    let report = ReportRepo::new(&state.pool).find(&key.0).await?;
    auth.ensure_owns(report.user_id)?;
    Ok(report)
}

/// The `data_source_id` field must name an existing data source the caller owns.
async fn owned_data_source_id(state: &AppState, auth: &AuthUser, form: &FormData) -> Result<i64, ApiError> {
    let id = form.require_id("data_source_id")?;
    match DataSourceRepo::new(&state.pool).get(id).await {
        Ok(ds) => {
            auth.ensure_owns(ds.user_id)?;
            Ok(ds.id)
        }
        Err(DbError::NotFound { .. }) => Err(ValidationError::InvalidFormat {
            field: "data_source_id",
            reason: "selected data source is invalid",
        }
        .into()),
        Err(e) => Err(e.into()),
    }
}

fn validate_upload(
    state: &AppState,
    field: &'static str,
    part: FilePart,
) -> Result<TemplateUpload, ValidationError> {
    TemplateUpload::validate(
        field,
        part.file_name.as_deref(),
        part.content_type.as_deref(),
        part.bytes,
        state.config.max_upload_bytes(),
    )
}

/// Explicit slugs must be free; generated ones are suffixed until they are.
async fn slug_for_create(repo: &ReportRepo<'_>, name: &str, explicit: Option<&str>) -> Result<Slug, ApiError> {
    match explicit {
        Some(raw) => {
            let slug = Slug::new(raw)?;
            if repo.slug_in_use(&slug, None).await? {
                return Err(ValidationError::Duplicate {
                    field: "slug",
                    value: slug.into_string(),
                }
                .into());
            }
            Ok(slug)
        }
        None => {
            let base = Slug::from_name(name, "report");
            let taken = repo.taken_slugs(&base).await?;
            Ok(next_free_slug(&base, &taken))
        }
    }
}

/// GET /reports - the caller's reports, filtered and paginated
async fn list_reports(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Query(query): Query<ListReportsQuery>,
) -> Result<Json<Paginated<ReportResponse>>, ApiError> {
    let filter = ReportFilter {
        name: non_blank(query.name),
        description: non_blank(query.description),
    };
    let page = Pagination::new(query.page.unwrap_or(1), query.per_page.unwrap_or(10));

    let result = ReportRepo::new(&state.pool)
        .list(auth.id(), &filter, page)
        .await?;
    Ok(Json(result.map(ReportResponse::from)))
}

/// POST /reports - create a report from a multipart form
async fn create_report(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    mut form: FormData,
) -> Result<(StatusCode, Json<ReportResponse>), ApiError> {
    let name = validate_name("name", form.require("name")?)?;
    let description = form.text("description").map(str::to_owned);
    let data_source_id = owned_data_source_id(&state, &auth, &form).await?;
    let part = form
        .take_file("report_file")
        .ok_or(ValidationError::Missing { field: "report_file" })?;
    let upload = validate_upload(&state, "report_file", part)?;

    let repo = ReportRepo::new(&state.pool);
    let slug = slug_for_create(&repo, &name, form.text("slug")).await?;

    // Row first: the storage directory is keyed by the report id
    let report = repo
        .create(NewReport {
            user_id: auth.id(),
            name,
            slug,
            description,
            data_source_id,
        })
        .await?;

    let dir = PrivateStorage::report_dir(auth.id(), report.id);
    let (file_name, bytes) = upload.into_parts();
    let file_path = match state.storage.put(&dir, &file_name, &bytes).await {
        Ok(path) => path,
        Err(e) => {
            if let Err(cleanup) = repo.delete(report.id).await {
                tracing::warn!(report_id = report.id, error = %cleanup, "failed to remove report row");
            }
            return Err(e.into());
        }
    };
    repo.set_file_path(report.id, &file_path).await?;

    tracing::info!(
        report_id = report.id,
        slug = %report.slug,
        file_path = %file_path,
        "report created"
    );
    let report = repo.get(report.id).await?;
    Ok((StatusCode::CREATED, Json(report.into())))
}

/// GET /reports/{report}
async fn show_report(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    key: ValidKey,
) -> Result<Json<ReportResponse>, ApiError> {
    let report = owned_report(&state, &auth, &key).await?;
    Ok(Json(report.into()))
}

async fn apply_update(
    state: &AppState,
    auth: &AuthUser,
    key: &ValidKey,
    mut form: FormData,
) -> Result<Report, ApiError> {
    let report = owned_report(state, auth, key).await?;
    let repo = ReportRepo::new(&state.pool);

    let name = validate_name("name", form.require("name")?)?;
    let slug = match form.text("slug") {
        Some(raw) => {
            let slug = Slug::new(raw)?;
            if repo.slug_in_use(&slug, Some(report.id)).await? {
                return Err(ValidationError::Duplicate {
                    field: "slug",
                    value: slug.into_string(),
                }
                .into());
            }
            Some(slug)
        }
        None => None,
    };
    let description = form.text("description").map(str::to_owned);
    let data_source_id = owned_data_source_id(state, auth, &form).await?;
    let upload = match form.take_file("report_file") {
        Some(part) => Some(validate_upload(state, "report_file", part)?),
        None => None,
    };

    if let Some(upload) = upload {
        let dir = PrivateStorage::report_dir(report.user_id, report.id);
        let (file_name, bytes) = upload.into_parts();
        let file_path = state.storage.put(&dir, &file_name, &bytes).await?;

        if let Some(old) = report.file_path.as_deref().filter(|old| *old != file_path) {
            state.storage.delete(old).await?;
        }
        repo.set_file_path(report.id, &file_path).await?;
        tracing::info!(report_id = report.id, file_path = %file_path, "report template replaced");
    }

    let updated = repo
        .update(
            report.id,
            ReportUpdate {
                name,
                slug,
                description,
                data_source_id,
            },
        )
        .await?;
    tracing::info!(report_id = updated.id, "report updated");
    Ok(updated)
}

/// PUT /reports/{report}
async fn update_report(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    key: ValidKey,
    form: FormData,
) -> Result<Json<ReportResponse>, ApiError> {
    let report = apply_update(&state, &auth, &key, form).await?;
    Ok(Json(report.into()))
}

/// POST /reports/{report}?_method=PUT - update for form clients
///
/// The override may also arrive as a `_method` form field.
async fn override_report(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    key: ValidKey,
    Query(over): Query<MethodOverride>,
    form: FormData,
) -> Result<Json<ReportResponse>, ApiError> {
    let method = over
        .method
        .or_else(|| form.text("_method").map(str::to_owned));
    if !method.is_some_and(|m| m.eq_ignore_ascii_case("PUT")) {
        return Err(ApiError::MethodNotAllowed);
    }
    let report = apply_update(&state, &auth, &key, form).await?;
    Ok(Json(report.into()))
}

/// DELETE /reports/{report} - files first, then the row
async fn delete_report(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    key: ValidKey,
) -> Result<StatusCode, ApiError> {
    let report = owned_report(&state, &auth, &key).await?;

    let report_dir = PrivateStorage::report_dir(report.user_id, report.id);
    match report.file_path.as_deref() {
        Some(file_path) => {
            state.storage.delete(file_path).await?;
            let resource_dir = parent_dir(file_path).unwrap_or(report_dir.as_str());
            state.storage.delete_dir(resource_dir).await?;
        }
        None => state.storage.delete_dir(&report_dir).await?,
    }

    ReportRepo::new(&state.pool).delete(report.id).await?;
    tracing::info!(report_id = report.id, "report deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// POST /reports/{report}/subreports - store next to the main template
async fn upload_subreport(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    key: ValidKey,
    mut form: FormData,
) -> Result<(StatusCode, Json<SubreportResponse>), ApiError> {
    let report = owned_report(&state, &auth, &key).await?;
    let part = form
        .take_file("subreport_file")
        .ok_or(ValidationError::Missing { field: "subreport_file" })?;
    let upload = validate_upload(&state, "subreport_file", part)?;

    let dir = report
        .file_path
        .as_deref()
        .and_then(parent_dir)
        .map(str::to_owned)
        .unwrap_or_else(|| PrivateStorage::report_dir(report.user_id, report.id));
    let (file_name, bytes) = upload.into_parts();
    let stored = state.storage.put(&dir, &file_name, &bytes).await?;

    tracing::info!(report_id = report.id, file_path = %stored, "subreport stored");
    Ok((
        StatusCode::CREATED,
        Json(SubreportResponse {
            message: "Subreport uploaded successfully",
            file_name,
        }),
    ))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/reports", get(list_reports).post(create_report))
        .route(
            "/reports/{report}",
            get(show_report)
                .put(update_report)
                .post(override_report)
                .delete(delete_report),
        )
        .route("/reports/{report}/subreports", post(upload_subreport))
}
