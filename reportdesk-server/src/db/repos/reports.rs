//! Report repository
//!
//! Reports link to data sources through `report_data_source`; the API
//! exposes the first attached source as `data_source_id`.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use sqlx::{FromRow, SqlitePool};

use reportdesk_core::models::{Paginated, Pagination, RecordKey, Slug};

use super::{contains_pattern, slug_in_use, taken_slugs, DbError};

/// Report record from database
#[derive(Debug, Clone, FromRow)]
pub struct Report {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    /// Main template, relative to the storage root
    pub file_path: Option<String>,
    pub data_source_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Owner-scoped list filters (`LIKE %value%`)
#[derive(Debug, Clone, Default)]
pub struct ReportFilter {
    pub name: Option<String>,
    pub description: Option<String>,
}

/// Values for a new report
#[derive(Debug, Clone)]
pub struct NewReport {
    pub user_id: i64,
    pub name: String,
    pub slug: Slug,
    pub description: Option<String>,
    pub data_source_id: i64,
}

/// Values for an update; `slug: None` keeps the current slug
#[derive(Debug, Clone)]
pub struct ReportUpdate {
    pub name: String,
    pub slug: Option<Slug>,
    pub description: Option<String>,
    pub data_source_id: i64,
}

const SELECT_REPORT: &str = r#"
    SELECT
        r.id, r.user_id, r.name, r.slug, r.description, r.file_path,
        (SELECT MIN(d.data_source_id) FROM report_data_source d WHERE d.report_id = r.id)
            AS data_source_id,
        r.created_at, r.updated_at
    FROM reports r
"#;

/// Report repository
pub struct ReportRepo<'a> {
    pool: &'a SqlitePool,
}

impl<'a> ReportRepo<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// List a user's reports, newest first.
    pub async fn list(
        &self,
        user_id: i64,
        filter: &ReportFilter,
        page: Pagination,
    ) -> Result<Paginated<Report>, DbError> {
        let name = filter.name.as_deref().map(contains_pattern);
        let description = filter.description.as_deref().map(contains_pattern);

        let (total,): (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(*) FROM reports r
            WHERE r.user_id = ?1
              AND (?2 IS NULL OR r.name LIKE ?2 ESCAPE '\')
              AND (?3 IS NULL OR r.description LIKE ?3 ESCAPE '\')
            "#,
        )
        .bind(user_id)
        .bind(name.as_deref())
        .bind(description.as_deref())
        .fetch_one(self.pool)
        .await?;

        let sql = format!(
            r#"{SELECT_REPORT}
            WHERE r.user_id = ?1
              AND (?2 IS NULL OR r.name LIKE ?2 ESCAPE '\')
              AND (?3 IS NULL OR r.description LIKE ?3 ESCAPE '\')
            ORDER BY r.created_at DESC, r.id DESC
            LIMIT ?4 OFFSET ?5"#
        );
        let items = sqlx::query_as::<_, Report>(&sql)
            .bind(user_id)
            .bind(name.as_deref())
            .bind(description.as_deref())
            .bind(page.limit() as i64)
            .bind(page.offset() as i64)
            .fetch_all(self.pool)
            .await?;

        Ok(Paginated::new(items, total, page))
    }

    /// Find by route key: ids match only ids, slugs match only slugs.
    pub async fn find(&self, key: &RecordKey) -> Result<Report, DbError> {
        let slug = match key {
            RecordKey::Id(id) => return self.get(*id).await,
            RecordKey::Slug(slug) => slug,
        };
        let sql = format!("{SELECT_REPORT} WHERE r.slug = ?1");
        sqlx::query_as::<_, Report>(&sql)
            .bind(slug)
            .fetch_optional(self.pool)
            .await?
            .ok_or_else(|| DbError::NotFound {
                resource: "report",
                id: slug.clone(),
            })
    }

    pub async fn get(&self, id: i64) -> Result<Report, DbError> {
        let sql = format!("{SELECT_REPORT} WHERE r.id = ?1");
        sqlx::query_as::<_, Report>(&sql)
            .bind(id)
            .fetch_optional(self.pool)
            .await?
            .ok_or_else(|| DbError::NotFound {
                resource: "report",
                id: id.to_string(),
            })
    }

    pub async fn taken_slugs(&self, base: &Slug) -> Result<HashSet<String>, DbError> {
        taken_slugs(self.pool, "reports", base).await
    }

    pub async fn slug_in_use(&self, slug: &Slug, except_id: Option<i64>) -> Result<bool, DbError> {
        slug_in_use(self.pool, "reports", slug.as_str(), except_id).await
    }

    /// Insert the report row and attach its data source (atomic).
    ///
    /// `file_path` stays NULL until the upload has been stored.
    pub async fn create(&self, new: NewReport) -> Result<Report, DbError> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let (id,): (i64,) = sqlx::query_as(
            r#"
            INSERT INTO reports (user_id, name, slug, description, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?5)
            RETURNING id
            "#,
        )
        .bind(new.user_id)
        .bind(&new.name)
        .bind(new.slug.as_str())
        .bind(new.description.as_deref())
        .bind(now)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| DbError::unique(e, format!("report slug '{}' is taken", new.slug)))?;

        sqlx::query("INSERT INTO report_data_source (report_id, data_source_id) VALUES (?1, ?2)")
            .bind(id)
            .bind(new.data_source_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        self.get(id).await
    }

    /// Update fields and sync the data-source attachment to exactly one source.
    pub async fn update(&self, id: i64, update: ReportUpdate) -> Result<Report, DbError> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            UPDATE reports
            SET name = ?1, slug = COALESCE(?2, slug), description = ?3, updated_at = ?4
            WHERE id = ?5
            "#,
        )
        .bind(&update.name)
        .bind(update.slug.as_ref().map(Slug::as_str))
        .bind(update.description.as_deref())
        .bind(Utc::now())
        .bind(id)
        .execute(&mut *tx)
        .await
        .map_err(|e| DbError::unique(e, "report slug is taken"))?;

        if result.rows_affected() == 0 {
            return Err(DbError::NotFound {
                resource: "report",
                id: id.to_string(),
            });
        }

        sqlx::query("DELETE FROM report_data_source WHERE report_id = ?1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("INSERT INTO report_data_source (report_id, data_source_id) VALUES (?1, ?2)")
            .bind(id)
            .bind(update.data_source_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        self.get(id).await
    }

    pub async fn set_file_path(&self, id: i64, file_path: &str) -> Result<(), DbError> {
        sqlx::query("UPDATE reports SET file_path = ?1, updated_at = ?2 WHERE id = ?3")
            .bind(file_path)
            .bind(Utc::now())
            .bind(id)
            .execute(self.pool)
            .await?;
        Ok(())
    }

    /// Delete a report; attachment rows cascade.
    pub async fn delete(&self, id: i64) -> Result<(), DbError> {
        sqlx::query("DELETE FROM reports WHERE id = ?1")
            .bind(id)
            .execute(self.pool)
            .await?;
        Ok(())
    }
}
