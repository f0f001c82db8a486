//! Data source endpoints

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use reportdesk_core::models::data_source::validate_configuration;
use reportdesk_core::models::{
    next_free_slug, validate_name, DataSourceKind, Paginated, Pagination, Slug, ValidationError,
};

use crate::db::{DataSource, DataSourceFilter, DataSourceRepo, DataSourceWrite};
use crate::http::error::ApiError;
use crate::http::extractors::{AuthUser, JsonBody, ValidKey};
use crate::http::server::AppState;

/// Data source response
#[derive(Debug, Serialize)]
pub struct DataSourceResponse {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
    pub slug: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub configuration: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<DataSource> for DataSourceResponse {
    fn from(ds: DataSource) -> Self {
        Self {
            id: ds.id,
            user_id: ds.user_id,
            name: ds.name,
            slug: ds.slug,
            kind: ds.kind,
            configuration: ds.configuration.0,
            created_at: ds.created_at,
            updated_at: ds.updated_at,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ListDataSourcesQuery {
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

/// Create/update body
#[derive(Debug, Default, Deserialize)]
pub struct DataSourceRequest {
    pub name: Option<String>,
    pub slug: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub configuration: Option<Value>,
}

/// Validated body, slug still unresolved
#[derive(Debug)]
struct DataSourceInput {
    name: String,
    slug: Option<Slug>,
    kind: DataSourceKind,
    configuration: Value,
}

impl DataSourceRequest {
    fn validate(self) -> Result<DataSourceInput, ValidationError> {
        let name = validate_name("name", self.name.as_deref().unwrap_or_default())?;
        let slug = match self.slug.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            Some(raw) => Some(Slug::new(raw)?),
            None => None,
        };
        let kind = self
            .kind
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .ok_or(ValidationError::Missing { field: "type" })?;
        let kind = DataSourceKind::parse(kind)?;
        let configuration = self
            .configuration
            .filter(|c| !c.is_null())
            .ok_or(ValidationError::Missing {
                field: "configuration",
            })?;
        validate_configuration(kind, &configuration)?;

        Ok(DataSourceInput {
            name,
            slug,
            kind,
            configuration,
        })
    }
}

async fn owned_data_source(
    state: &AppState,
    auth: &AuthUser,
    key: &ValidKey,
) -> Result<DataSource, ApiError> {
    let ds = DataSourceRepo::new(&state.pool).find(&key.0).await?;
    auth.ensure_owns(ds.user_id)?;
    Ok(ds)
}

async fn ensure_slug_free(
    repo: &DataSourceRepo<'_>,
    slug: Slug,
    except_id: Option<i64>,
) -> Result<Slug, ApiError> {
    if repo.slug_in_use(&slug, except_id).await? {
        return Err(ValidationError::Duplicate {
            field: "slug",
            value: slug.into_string(),
        }
        .into());
    }
    Ok(slug)
}

/// GET /datasources
async fn list_data_sources(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Query(query): Query<ListDataSourcesQuery>,
) -> Result<Json<Paginated<DataSourceResponse>>, ApiError> {
    let kind = match query.kind.as_deref().map(str::trim).filter(|k| !k.is_empty()) {
        Some(raw) => Some(DataSourceKind::parse(raw)?),
        None => None,
    };
    let filter = DataSourceFilter {
        name: query
            .name
            .map(|n| n.trim().to_owned())
            .filter(|n| !n.is_empty()),
        kind,
    };
    let page = Pagination::new(query.page.unwrap_or(1), query.per_page.unwrap_or(10));

    let result = DataSourceRepo::new(&state.pool)
        .list(auth.id(), &filter, page)
        .await?;
    Ok(Json(result.map(DataSourceResponse::from)))
}

/// POST /datasources
async fn create_data_source(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    JsonBody(req): JsonBody<DataSourceRequest>,
) -> Result<(StatusCode, Json<DataSourceResponse>), ApiError> {
    let input = req.validate()?;
    let repo = DataSourceRepo::new(&state.pool);

    let slug = match input.slug {
        Some(slug) => ensure_slug_free(&repo, slug, None).await?,
        None => {
            let base = Slug::from_name(&input.name, "data-source");
            let taken = repo.taken_slugs(&base).await?;
            next_free_slug(&base, &taken)
        }
    };

    let ds = repo
        .create(
            auth.id(),
            DataSourceWrite {
                name: input.name,
                slug,
                kind: input.kind,
                configuration: input.configuration,
            },
        )
        .await?;

    tracing::info!(data_source_id = ds.id, kind = %input.kind, "data source created");
    Ok((StatusCode::CREATED, Json(ds.into())))
}

/// GET /datasources/{data_source}
async fn show_data_source(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    key: ValidKey,
) -> Result<Json<DataSourceResponse>, ApiError> {
    let ds = owned_data_source(&state, &auth, &key).await?;
    Ok(Json(ds.into()))
}

/// PUT /datasources/{data_source} - slug kept unless a new one is given
async fn update_data_source(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    key: ValidKey,
    JsonBody(req): JsonBody<DataSourceRequest>,
) -> Result<Json<DataSourceResponse>, ApiError> {
    let ds = owned_data_source(&state, &auth, &key).await?;
    let input = req.validate()?;
    let repo = DataSourceRepo::new(&state.pool);

    let slug = match input.slug {
        Some(slug) => ensure_slug_free(&repo, slug, Some(ds.id)).await?,
        None => Slug::new(&ds.slug).unwrap_or_else(|_| Slug::from_name(&ds.slug, "data-source")),
    };

    let updated = repo
        .update(
            ds.id,
            DataSourceWrite {
                name: input.name,
                slug,
                kind: input.kind,
                configuration: input.configuration,
            },
        )
        .await?;

    tracing::info!(data_source_id = updated.id, "data source updated");
    Ok(Json(updated.into()))
}

/// DELETE /datasources/{data_source}
async fn delete_data_source(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    key: ValidKey,
) -> Result<StatusCode, ApiError> {
    let ds = owned_data_source(&state, &auth, &key).await?;
    DataSourceRepo::new(&state.pool).delete(ds.id).await?;
    tracing::info!(data_source_id = ds.id, "data source deleted");
    Ok(StatusCode::NO_CONTENT)
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/datasources",
            get(list_data_sources).post(create_data_source),
        )
        .route(
            "/datasources/{data_source}",
            get(show_data_source)
                .put(update_data_source)
                .delete(delete_data_source),
        )
}
