//! Registration, login and the current user

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use reportdesk_core::models::{validate_email, validate_name, ValidationError};

use crate::auth::{self, MIN_PASSWORD_LEN};
use crate::db::{TokenRepo, User, UserRepo};
use crate::http::error::ApiError;
use crate::http::extractors::{AuthUser, JsonBody};
use crate::http::server::AppState;

/// Name given to tokens issued by login and registration
const TOKEN_NAME: &str = "api";

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub password_confirmation: Option<String>,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Deserialize)]
pub struct ProfileRequest {
    pub name: Option<String>,
    pub email: Option<String>,
}

/// User plus a freshly issued token
#[derive(Serialize)]
pub struct TokenResponse {
    pub user: User,
    pub token: String,
}

fn required<'a>(field: &'static str, value: &'a Option<String>) -> Result<&'a str, ValidationError> {
    value.as_deref().ok_or(ValidationError::Missing { field })
}

/// POST /register
async fn register(
    State(state): State<Arc<AppState>>,
    JsonBody(req): JsonBody<RegisterRequest>,
) -> Result<(StatusCode, Json<TokenResponse>), ApiError> {
    let name = validate_name("name", required("name", &req.name)?)?;
    let email = validate_email(required("email", &req.email)?)?;
    let password = required("password", &req.password)?.to_owned();

    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ValidationError::InvalidFormat {
            field: "password",
            reason: "must be at least 8 characters",
        }
        .into());
    }
    if req.password_confirmation.as_deref() != Some(password.as_str()) {
        return Err(ValidationError::InvalidFormat {
            field: "password",
            reason: "confirmation does not match",
        }
        .into());
    }

    let users = UserRepo::new(&state.pool);
    if users.find_by_email(&email).await?.is_some() {
        return Err(ValidationError::Duplicate {
            field: "email",
            value: email,
        }
        .into());
    }

    let hash = tokio::task::spawn_blocking(move || auth::hash_password(&password)).await??;
    let user = users.create(&name, &email, &hash).await?;
    let token = auth::issue_token(&state.pool, user.id, TOKEN_NAME).await?;

    tracing::info!(user_id = user.id, "user registered");
    Ok((StatusCode::CREATED, Json(TokenResponse { user, token })))
}

/// POST /login
async fn login(
    State(state): State<Arc<AppState>>,
    JsonBody(req): JsonBody<LoginRequest>,
) -> Result<Json<TokenResponse>, ApiError> {
    let email = required("email", &req.email)?.trim().to_owned();
    let password = required("password", &req.password)?.to_owned();

    let invalid = || ApiError::Unauthenticated {
        message: "These credentials do not match our records.".to_string(),
    };

    let user = UserRepo::new(&state.pool)
        .find_by_email(&email)
        .await?
        .ok_or_else(invalid)?;

    let hash = user.password_hash.clone();
    let verified =
        tokio::task::spawn_blocking(move || auth::verify_password(&password, &hash)).await??;
    if !verified {
        tracing::debug!(user_id = user.id, "login rejected");
        return Err(invalid());
    }

    let token = auth::issue_token(&state.pool, user.id, TOKEN_NAME).await?;
    tracing::info!(user_id = user.id, "user logged in");
    Ok(Json(TokenResponse { user, token }))
}

/// POST /logout - revoke the token used for this request
async fn logout(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
) -> Result<StatusCode, ApiError> {
    TokenRepo::new(&state.pool).delete(auth.token_id).await?;
    tracing::info!(user_id = auth.id(), "user logged out");
    Ok(StatusCode::NO_CONTENT)
}

/// GET /user
async fn current_user(auth: AuthUser) -> Json<User> {
    Json(auth.user)
}

/// PUT /user/profile-information
async fn update_profile(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    JsonBody(req): JsonBody<ProfileRequest>,
) -> Result<Json<User>, ApiError> {
    let name = validate_name("name", required("name", &req.name)?)?;
    let email = validate_email(required("email", &req.email)?)?;

    let users = UserRepo::new(&state.pool);
    if let Some(other) = users.find_by_email(&email).await? {
        if other.id != auth.id() {
            return Err(ValidationError::Duplicate {
                field: "email",
                value: email,
            }
            .into());
        }
    }

    let user = users.update_profile(auth.id(), &name, &email).await?;
    Ok(Json(user))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/user", get(current_user))
        .route("/user/profile-information", put(update_profile))
}
