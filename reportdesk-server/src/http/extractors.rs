//! Custom Axum extractors

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{FromRequest, FromRequestParts, Multipart, Path, Request};
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::Json;
use serde::de::DeserializeOwned;

use reportdesk_core::models::{RecordKey, ValidationError};

use super::error::{ApiError, UNAUTHORIZED_ACTION};
use super::server::AppState;
use crate::auth;
use crate::db::User;

/// Authenticated caller, resolved from `Authorization: Bearer {id}|{secret}`
pub struct AuthUser {
    pub user: User,
    /// Token used for this request (revoked on logout)
    pub token_id: i64,
}

impl AuthUser {
    pub fn id(&self) -> i64 {
        self.user.id
    }

    /// 403 unless the caller owns the record.
    pub fn ensure_owns(&self, owner_id: i64) -> Result<(), ApiError> {
        if owner_id == self.user.id {
            Ok(())
        } else {
            Err(ApiError::forbidden(UNAUTHORIZED_ACTION))
        }
    }
}

impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or_else(ApiError::unauthenticated)?;

        match auth::authenticate(&state.pool, token).await? {
            Some((user, token_id)) => Ok(Self { user, token_id }),
            None => Err(ApiError::unauthenticated()),
        }
    }
}

/// Extract a `{slug|id}` path segment
pub struct ValidKey(pub RecordKey);

impl<S> FromRequestParts<S> for ValidKey
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(raw): Path<String> = Path::from_request_parts(parts, state)
            .await
            .map_err(|_| ApiError::Validation(ValidationError::Empty { field: "key" }))?;

        let raw = raw.trim();
        if raw.is_empty() {
            return Err(ApiError::Validation(ValidationError::Empty { field: "key" }));
        }
        Ok(Self(RecordKey::parse(raw)))
    }
}

/// JSON body whose rejections render as API errors (400)
///
/// Request structs keep required fields optional so that missing values
/// surface as field validation errors instead.
pub struct JsonBody<T>(pub T);

impl<S, T> FromRequest<S> for JsonBody<T>
where
    S: Send + Sync,
    T: DeserializeOwned,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| ApiError::BadRequest(rejection.body_text()))?;
        Ok(Self(value))
    }
}

/// An uploaded file part
#[derive(Debug, Clone)]
pub struct FilePart {
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

/// Buffered multipart form: text fields and file parts by name
#[derive(Debug, Default)]
pub struct FormData {
    fields: HashMap<String, String>,
    files: HashMap<String, FilePart>,
}

impl FormData {
    /// Text field, trimmed; blank values count as absent.
    pub fn text(&self, name: &str) -> Option<&str> {
        self.fields
            .get(name)
            .map(|value| value.trim())
            .filter(|value| !value.is_empty())
    }

    /// Required text field.
    pub fn require(&self, name: &'static str) -> Result<&str, ValidationError> {
        self.text(name).ok_or(ValidationError::Missing { field: name })
    }

    /// Required integer id field.
    pub fn require_id(&self, name: &'static str) -> Result<i64, ValidationError> {
        self.require(name)?
            .parse()
            .map_err(|_| ValidationError::InvalidFormat {
                field: name,
                reason: "must be an integer",
            })
    }

    pub fn take_file(&mut self, name: &str) -> Option<FilePart> {
        self.files.remove(name)
    }

    pub fn insert_text(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.fields.insert(name.into(), value.into());
    }
}

impl<S> FromRequest<S> for FormData
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let mut multipart = Multipart::from_request(req, state)
            .await
            .map_err(|rejection| ApiError::BadRequest(rejection.body_text()))?;

        let mut form = FormData::default();
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| ApiError::BadRequest(e.body_text()))?
        {
            let Some(name) = field.name().map(str::to_owned) else {
                continue;
            };

            match field.file_name().map(str::to_owned) {
                Some(file_name) => {
                    let content_type = field.content_type().map(str::to_owned);
                    let bytes = field
                        .bytes()
                        .await
                        .map_err(|e| ApiError::BadRequest(e.body_text()))?;
                    form.files.insert(
                        name,
                        FilePart {
                            file_name: Some(file_name),
                            content_type,
                            bytes: bytes.to_vec(),
                        },
                    );
                }
                None => {
                    let value = field
                        .text()
                        .await
                        .map_err(|e| ApiError::BadRequest(e.body_text()))?;
                    form.fields.insert(name, value);
                }
            }
        }

        Ok(form)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_text_is_absent() {
        let mut form = FormData::default();
        form.insert_text("name", "  Sales ");
        form.insert_text("slug", "   ");
        form.insert_text("data_source_id", "x1");

        assert_eq!(form.text("name"), Some("Sales"));
        assert_eq!(form.text("slug"), None);
        assert!(matches!(
            form.require("description"),
            Err(ValidationError::Missing { field: "description" })
        ));
        assert!(matches!(
            form.require_id("data_source_id"),
            Err(ValidationError::InvalidFormat { .. })
        ));
    }
}
