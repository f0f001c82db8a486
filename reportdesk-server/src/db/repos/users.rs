//! User repository

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{FromRow, SqlitePool};

use super::DbError;

/// User record from database
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub email: String,
    #[serde(skip)]
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

const USER_COLUMNS: &str = "id, name, email, password_hash, created_at, updated_at";

/// User repository
pub struct UserRepo<'a> {
    pool: &'a SqlitePool,
}

impl<'a> UserRepo<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a user; a taken e-mail is a `Conflict`.
    pub async fn create(
        &self,
        name: &str,
        email: &str,
        password_hash: &str,
    ) -> Result<User, DbError> {
        let now = Utc::now();
        let sql = format!(
            "INSERT INTO users (name, email, password_hash, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?4) RETURNING {USER_COLUMNS}"
        );
        sqlx::query_as::<_, User>(&sql)
            .bind(name)
            .bind(email)
            .bind(password_hash)
            .bind(now)
            .fetch_one(self.pool)
            .await
            .map_err(|e| DbError::unique(e, format!("email '{email}' is already registered")))
    }

    pub async fn get(&self, id: i64) -> Result<User, DbError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1");
        sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(self.pool)
            .await?
            .ok_or_else(|| DbError::NotFound {
                resource: "user",
                id: id.to_string(),
            })
    }

    pub async fn find_by_email(&self, email: &str) -> Result<Option<User>, DbError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?1");
        Ok(sqlx::query_as::<_, User>(&sql)
            .bind(email)
            .fetch_optional(self.pool)
            .await?)
    }

    /// Update name and e-mail; an e-mail owned by another user is a `Conflict`.
    pub async fn update_profile(&self, id: i64, name: &str, email: &str) -> Result<User, DbError> {
        let sql = format!(
            "UPDATE users SET name = ?1, email = ?2, updated_at = ?3 WHERE id = ?4 \
             RETURNING {USER_COLUMNS}"
        );
        sqlx::query_as::<_, User>(&sql)
            .bind(name)
            .bind(email)
            .bind(Utc::now())
            .bind(id)
            .fetch_optional(self.pool)
            .await
            .map_err(|e| DbError::unique(e, format!("email '{email}' is already registered")))?
            .ok_or_else(|| DbError::NotFound {
                resource: "user",
                id: id.to_string(),
            })
    }
}
