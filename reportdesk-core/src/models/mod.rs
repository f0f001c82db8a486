//! Domain models with validation at construction
//!
//! All user input is validated when creating these types.
//! Invalid input returns ValidationError, not panic.

pub mod data_source;
pub mod format;
pub mod key;
pub mod pagination;
pub mod slug;
pub mod upload;
pub mod validation;

pub use data_source::{DataSourceKind, DbConnection, ResolvedData};
pub use format::{content_type_for, OutputFormat};
pub use key::RecordKey;
pub use pagination::{Paginated, Pagination, PaginationParams};
pub use slug::{next_free_slug, slugify, Slug};
pub use upload::TemplateUpload;
pub use validation::ValidationError;

/// Maximum length for names and slugs (VARCHAR(255) in the schema)
pub const MAX_NAME_LEN: usize = 255;

/// Validate a required display name: trimmed, non-empty, at most 255 chars.
pub fn validate_name(field: &'static str, value: &str) -> Result<String, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::Empty { field });
    }
    if trimmed.chars().count() > MAX_NAME_LEN {
        return Err(ValidationError::TooLong {
            field,
            max: MAX_NAME_LEN,
        });
    }
    Ok(trimmed.to_owned())
}

/// Validate an e-mail address: `local@domain` with a dotted domain.
pub fn validate_email(value: &str) -> Result<String, ValidationError> {
    let email = validate_name("email", value)?;
    let valid = email.split_once('@').is_some_and(|(local, domain)| {
        !local.is_empty()
            && !domain.contains('@')
            && domain.contains('.')
            && !domain.starts_with('.')
            && !domain.ends_with('.')
            && !email.chars().any(char::is_whitespace)
    });
    if !valid {
        return Err(ValidationError::InvalidFormat {
            field: "email",
            reason: "must be a valid email address",
        });
    }
    Ok(email)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_is_trimmed() {
        assert_eq!(validate_name("name", "  Sales  ").unwrap(), "Sales");
    }

    #[test]
    fn name_rejects_blank_and_long() {
        assert!(matches!(
            validate_name("name", "   "),
            Err(ValidationError::Empty { field: "name" })
        ));
        let long = "x".repeat(256);
        assert!(matches!(
            validate_name("name", &long),
            Err(ValidationError::TooLong { max: 255, .. })
        ));
    }

    #[test]
    fn email_shape() {
        assert_eq!(validate_email(" ada@example.com ").unwrap(), "ada@example.com");
        assert!(validate_email("ada").is_err());
        assert!(validate_email("ada@localhost").is_err());
        assert!(validate_email("a da@example.com").is_err());
        assert!(validate_email("@example.com").is_err());
    }
}
