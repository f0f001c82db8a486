//! Route keys: records are addressed by slug or by numeric id

/// A `{slug|id}` path segment
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordKey {
    Id(i64),
    Slug(String),
}

impl RecordKey {
    /// Positive integers are ids, anything else is a slug.
    pub fn parse(s: &str) -> Self {
        match s.parse::<i64>() {
            Ok(id) if id > 0 => Self::Id(id),
            _ => Self::Slug(s.to_owned()),
        }
    }

    /// The raw text, for error messages.
    pub fn describe(&self) -> String {
        match self {
            Self::Id(id) => id.to_string(),
            Self::Slug(slug) => slug.clone(),
        }
    }
}
