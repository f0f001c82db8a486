//! Validation error types

use std::fmt;

/// Validation error for domain models
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Field is empty when it shouldn't be
    Empty { field: &'static str },

    /// Required field was not supplied at all
    Missing { field: &'static str },

    /// Field exceeds maximum length
    TooLong { field: &'static str, max: usize },

    /// String doesn't match required format (e.g., slug)
    InvalidFormat { field: &'static str, reason: &'static str },

    /// Invalid enum variant
    InvalidVariant { field: &'static str, value: String },

    /// Value must be unique but is already taken
    Duplicate { field: &'static str, value: String },
}

impl ValidationError {
    /// Name of the offending field, used as the key of the error bag.
    pub fn field(&self) -> &'static str {
        match self {
            Self::Empty { field }
            | Self::Missing { field }
            | Self::TooLong { field, .. }
            | Self::InvalidFormat { field, .. }
            | Self::InvalidVariant { field, .. }
            | Self::Duplicate { field, .. } => field,
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty { field } => write!(f, "{} cannot be empty", field),
            Self::Missing { field } => write!(f, "{} is required", field),
            Self::TooLong { field, max } => {
                write!(f, "{} exceeds maximum length of {} characters", field, max)
            }
            Self::InvalidFormat { field, reason } => {
                write!(f, "{}: {}", field, reason)
            }
            Self::InvalidVariant { field, value } => {
                write!(f, "invalid {} value: '{}'", field, value)
            }
            Self::Duplicate { field, value } => {
                write!(f, "{} '{}' has already been taken", field, value)
            }
        }
    }
}

impl std::error::Error for ValidationError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = ValidationError::TooLong {
            field: "name",
            max: 255,
        };
        assert_eq!(
            err.to_string(),
            "name exceeds maximum length of 255 characters"
        );

        let err = ValidationError::Duplicate {
            field: "slug",
            value: "sales".into(),
        };
        assert_eq!(err.to_string(), "slug 'sales' has already been taken");
    }

    #[test]
    fn field_name() {
        let err = ValidationError::InvalidVariant {
            field: "format",
            value: "odt".into(),
        };
        assert_eq!(err.field(), "format");
    }
}
