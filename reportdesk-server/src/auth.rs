//! Credentials: password hashing and personal access tokens
//!
//! Passwords are stored as Argon2id PHC strings. API tokens are random
//! 40-character secrets; the database keeps only their sha256, and the
//! client receives `{token_id}|{secret}` once.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use rand::distributions::Alphanumeric;
use rand::Rng;
use sha2::{Digest, Sha256};
use sqlx::SqlitePool;

use crate::db::{DbError, TokenRepo, User};

/// Length of a token secret
const TOKEN_SECRET_LEN: usize = 40;

/// Minimum password length accepted at registration
pub const MIN_PASSWORD_LEN: usize = 8;

/// Credential error type
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("password hashing failed: {0}")]
    Hash(String),

    #[error("stored password hash is malformed")]
    MalformedHash,

    #[error(transparent)]
    Db(#[from] DbError),
}

/// Hash a password with Argon2id and a fresh salt.
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AuthError::Hash(e.to_string()))
}

/// Check a password against a stored hash.
pub fn verify_password(password: &str, hash: &str) -> Result<bool, AuthError> {
    let parsed = PasswordHash::new(hash).map_err(|_| AuthError::MalformedHash)?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

/// Hex sha256 of a token secret, as stored in the database.
pub fn hash_token(secret: &str) -> String {
    hex::encode(Sha256::digest(secret.as_bytes()))
}

fn generate_secret() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(TOKEN_SECRET_LEN)
        .map(char::from)
        .collect()
}

/// Issue a token for `user_id`; returns the plaintext `{id}|{secret}`.
pub async fn issue_token(pool: &SqlitePool, user_id: i64, name: &str) -> Result<String, AuthError> {
    let secret = generate_secret();
    let id = TokenRepo::new(pool)
        .create(user_id, name, &hash_token(&secret))
        .await?;
    Ok(format!("{id}|{secret}"))
}

/// Split a plaintext token into id and secret.
pub fn parse_token(token: &str) -> Option<(i64, &str)> {
    let (id, secret) = token.split_once('|')?;
    let id = id.parse().ok()?;
    if secret.is_empty() {
        return None;
    }
    Some((id, secret))
}

/// Resolve a plaintext token to its user.
pub async fn authenticate(pool: &SqlitePool, token: &str) -> Result<Option<(User, i64)>, AuthError> {
    let Some((id, secret)) = parse_token(token) else {
        return Ok(None);
    };
    let user = TokenRepo::new(pool)
        .authenticate(id, &hash_token(secret))
        .await?;
    Ok(user.map(|u| (u, id)))
}
