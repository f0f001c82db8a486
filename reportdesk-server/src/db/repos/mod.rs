//! Repository implementations for database access
//!
//! Each repository borrows the pool and follows these patterns:
//! - Owner filtering happens in the handlers, lookups here are global
//! - Unique-constraint violations surface as `DbError::Conflict`
//! - Transactions for multi-step writes

pub mod data_sources;
pub mod reports;
pub mod tokens;
pub mod users;

use std::collections::HashSet;

use sqlx::SqlitePool;

use reportdesk_core::models::Slug;

pub use data_sources::{DataSource, DataSourceFilter, DataSourceRepo, DataSourceWrite};
pub use reports::{NewReport, Report, ReportFilter, ReportRepo, ReportUpdate};
pub use tokens::TokenRepo;
pub use users::{User, UserRepo};

/// Database error type
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("not found: {resource} '{id}'")]
    NotFound { resource: &'static str, id: String },

    #[error("conflict: {0}")]
    Conflict(String),
}

impl DbError {
    /// Map a unique-constraint violation to `Conflict`, keep anything else.
    pub(crate) fn unique(err: sqlx::Error, what: impl Into<String>) -> Self {
        match &err {
            sqlx::Error::Database(db) if db.is_unique_violation() => Self::Conflict(what.into()),
            _ => Self::Sqlx(err),
        }
    }
}

/// Slugs in `table` equal to `base` or of the form `base-*`.
async fn taken_slugs(
    pool: &SqlitePool,
    table: &'static str,
    base: &Slug,
) -> Result<HashSet<String>, DbError> {
    let sql = format!("SELECT slug FROM {table} WHERE slug = ?1 OR slug LIKE ?2");
    let rows: Vec<(String,)> = sqlx::query_as(&sql)
        .bind(base.as_str())
        .bind(format!("{}-%", base.as_str()))
        .fetch_all(pool)
        .await?;

    Ok(rows.into_iter().map(|(slug,)| slug).collect())
}

/// Whether `slug` is used in `table` by a row other than `except_id`.
async fn slug_in_use(
    pool: &SqlitePool,
    table: &'static str,
    slug: &str,
    except_id: Option<i64>,
) -> Result<bool, DbError> {
    let sql = format!("SELECT EXISTS(SELECT 1 FROM {table} WHERE slug = ?1 AND id != ?2)");
    let (exists,): (bool,) = sqlx::query_as(&sql)
        .bind(slug)
        .bind(except_id.unwrap_or(0))
        .fetch_one(pool)
        .await?;
    Ok(exists)
}

/// SQL `LIKE` pattern matching `value` anywhere.
fn contains_pattern(value: &str) -> String {
    let escaped = value
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}

#[cfg(test)]
pub(crate) mod test_support {
    use sqlx::SqlitePool;

    use super::*;
    use crate::db::{create_memory_pool, migrations};

    pub async fn pool() -> SqlitePool {
        let pool = create_memory_pool().await.unwrap();
        migrations::run(&pool).await.unwrap();
        pool
    }

    pub async fn user(pool: &SqlitePool, email: &str) -> User {
        UserRepo::new(pool)
            .create("Test User", email, "not-a-real-hash")
            .await
            .unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn like_pattern_escapes_wildcards() {
        assert_eq!(contains_pattern("sales"), "%sales%");
        assert_eq!(contains_pattern("50%_off"), "%50\\%\\_off%");
    }
}
