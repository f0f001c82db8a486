//! Personal access tokens
//!
//! Only the sha256 of a token secret is stored; the plaintext is shown to
//! the client once, as `{id}|{secret}`.

use chrono::Utc;
use sqlx::SqlitePool;

use super::{DbError, User};

/// Token repository
pub struct TokenRepo<'a> {
    pool: &'a SqlitePool,
}

impl<'a> TokenRepo<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Store a token hash for `user_id`, returning the token id.
    pub async fn create(&self, user_id: i64, name: &str, token_hash: &str) -> Result<i64, DbError> {
        let (id,): (i64,) = sqlx::query_as(
            r#"
            INSERT INTO personal_access_tokens (user_id, name, token_hash, created_at)
            VALUES (?1, ?2, ?3, ?4)
            RETURNING id
            "#,
        )
        .bind(user_id)
        .bind(name)
        .bind(token_hash)
        .bind(Utc::now())
        .fetch_one(self.pool)
        .await?;
        Ok(id)
    }

    /// Resolve a token to its user and record the use.
    ///
    /// Both the id and the hash must match.
    pub async fn authenticate(&self, token_id: i64, token_hash: &str) -> Result<Option<User>, DbError> {
        let user: Option<User> = sqlx::query_as(
            r#"
            SELECT u.id, u.name, u.email, u.password_hash, u.created_at, u.updated_at
            FROM personal_access_tokens t
            JOIN users u ON u.id = t.user_id
            WHERE t.id = ?1 AND t.token_hash = ?2
            "#,
        )
        .bind(token_id)
        .bind(token_hash)
        .fetch_optional(self.pool)
        .await?;

        if user.is_some() {
            sqlx::query("UPDATE personal_access_tokens SET last_used_at = ?1 WHERE id = ?2")
                .bind(Utc::now())
                .bind(token_id)
                .execute(self.pool)
                .await?;
        }

        Ok(user)
    }

    /// Revoke a token (idempotent).
    pub async fn delete(&self, token_id: i64) -> Result<(), DbError> {
        sqlx::query("DELETE FROM personal_access_tokens WHERE id = ?1")
            .bind(token_id)
            .execute(self.pool)
            .await?;
        Ok(())
    }
}
