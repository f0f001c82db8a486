//! Data source repository

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use sqlx::types::Json;
use sqlx::{FromRow, SqlitePool};

use reportdesk_core::models::{DataSourceKind, Paginated, Pagination, RecordKey, Slug};

use super::{contains_pattern, slug_in_use, taken_slugs, DbError};

/// Data source record from database
#[derive(Debug, Clone, FromRow)]
pub struct DataSource {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
    pub slug: String,
    #[sqlx(rename = "type")]
    pub kind: String,
    pub configuration: Json<JsonValue>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DataSource {
    /// Stored kind; rows written by this service always parse.
    pub fn kind(&self) -> Option<DataSourceKind> {
        DataSourceKind::parse(&self.kind).ok()
    }
}

/// Owner-scoped list filters
#[derive(Debug, Clone, Default)]
pub struct DataSourceFilter {
    /// `LIKE %name%`
    pub name: Option<String>,
    /// Exact kind
    pub kind: Option<DataSourceKind>,
}

/// Values written on create and update
#[derive(Debug, Clone)]
pub struct DataSourceWrite {
    pub name: String,
    pub slug: Slug,
    pub kind: DataSourceKind,
    pub configuration: JsonValue,
}

const DATA_SOURCE_COLUMNS: &str =
    "id, user_id, name, slug, type, configuration, created_at, updated_at";

/// Data source repository
pub struct DataSourceRepo<'a> {
    pool: &'a SqlitePool,
}

impl<'a> DataSourceRepo<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn list(
        &self,
        user_id: i64,
        filter: &DataSourceFilter,
        page: Pagination,
    ) -> Result<Paginated<DataSource>, DbError> {
        let name = filter.name.as_deref().map(contains_pattern);
        let kind = filter.kind.map(|k| k.as_str());

        let (total,): (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(*) FROM data_sources
            WHERE user_id = ?1
              AND (?2 IS NULL OR name LIKE ?2 ESCAPE '\')
              AND (?3 IS NULL OR type = ?3)
            "#,
        )
        .bind(user_id)
        .bind(name.as_deref())
        .bind(kind)
        .fetch_one(self.pool)
        .await?;

        let sql = format!(
            r#"SELECT {DATA_SOURCE_COLUMNS} FROM data_sources
            WHERE user_id = ?1
              AND (?2 IS NULL OR name LIKE ?2 ESCAPE '\')
              AND (?3 IS NULL OR type = ?3)
            ORDER BY created_at DESC, id DESC
            LIMIT ?4 OFFSET ?5"#
        );
        let items = sqlx::query_as::<_, DataSource>(&sql)
            .bind(user_id)
            .bind(name.as_deref())
            .bind(kind)
            .bind(page.limit() as i64)
            .bind(page.offset() as i64)
            .fetch_all(self.pool)
            .await?;

        Ok(Paginated::new(items, total, page))
    }

    /// Find by route key: ids match only ids, slugs match only slugs.
    pub async fn find(&self, key: &RecordKey) -> Result<DataSource, DbError> {
        let slug = match key {
            RecordKey::Id(id) => return self.get(*id).await,
            RecordKey::Slug(slug) => slug,
        };
        let sql = format!("SELECT {DATA_SOURCE_COLUMNS} FROM data_sources WHERE slug = ?1");
        sqlx::query_as::<_, DataSource>(&sql)
            .bind(slug)
            .fetch_optional(self.pool)
            .await?
            .ok_or_else(|| DbError::NotFound {
                resource: "data source",
                id: slug.clone(),
            })
    }

    pub async fn get(&self, id: i64) -> Result<DataSource, DbError> {
        let sql = format!("SELECT {DATA_SOURCE_COLUMNS} FROM data_sources WHERE id = ?1");
        sqlx::query_as::<_, DataSource>(&sql)
            .bind(id)
            .fetch_optional(self.pool)
            .await?
            .ok_or_else(|| DbError::NotFound {
                resource: "data source",
                id: id.to_string(),
            })
    }

    pub async fn taken_slugs(&self, base: &Slug) -> Result<HashSet<String>, DbError> {
        taken_slugs(self.pool, "data_sources", base).await
    }

    pub async fn slug_in_use(&self, slug: &Slug, except_id: Option<i64>) -> Result<bool, DbError> {
        slug_in_use(self.pool, "data_sources", slug.as_str(), except_id).await
    }

    pub async fn create(&self, user_id: i64, write: DataSourceWrite) -> Result<DataSource, DbError> {
        let sql = format!(
            "INSERT INTO data_sources (user_id, name, slug, type, configuration, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6) RETURNING {DATA_SOURCE_COLUMNS}"
        );
        sqlx::query_as::<_, DataSource>(&sql)
            .bind(user_id)
            .bind(&write.name)
            .bind(write.slug.as_str())
            .bind(write.kind.as_str())
            .bind(Json(&write.configuration))
            .bind(Utc::now())
            .fetch_one(self.pool)
            .await
            .map_err(|e| DbError::unique(e, format!("data source slug '{}' is taken", write.slug)))
    }

    pub async fn update(&self, id: i64, write: DataSourceWrite) -> Result<DataSource, DbError> {
        let sql = format!(
            "UPDATE data_sources \
             SET name = ?1, slug = ?2, type = ?3, configuration = ?4, updated_at = ?5 \
             WHERE id = ?6 RETURNING {DATA_SOURCE_COLUMNS}"
        );
        sqlx::query_as::<_, DataSource>(&sql)
            .bind(&write.name)
            .bind(write.slug.as_str())
            .bind(write.kind.as_str())
            .bind(Json(&write.configuration))
            .bind(Utc::now())
            .bind(id)
            .fetch_optional(self.pool)
            .await
            .map_err(|e| DbError::unique(e, format!("data source slug '{}' is taken", write.slug)))?
            .ok_or_else(|| DbError::NotFound {
                resource: "data source",
                id: id.to_string(),
            })
    }

    /// Delete a data source; report attachments cascade.
    pub async fn delete(&self, id: i64) -> Result<(), DbError> {
        sqlx::query("DELETE FROM data_sources WHERE id = ?1")
            .bind(id)
            .execute(self.pool)
            .await?;
        Ok(())
    }
}
