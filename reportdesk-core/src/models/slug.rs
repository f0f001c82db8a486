//! Slugs for reports and data sources
//!
//! Slug format: lowercase alphanumeric with hyphens/underscores, never all
//! digits (those address records by id).
//! Slugs are globally unique per table; generated slugs are suffixed
//! deterministically (`base`, `base-2`, `base-3`, ...).

use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::{ValidationError, MAX_NAME_LEN};

/// Starts with alphanumeric, then alphanumerics, hyphens or underscores
static SLUG_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z0-9][a-z0-9_-]*$").expect("invalid slug regex"));

/// Validated slug
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Slug(String);

impl Slug {
    /// Validate a user-supplied slug.
    ///
    /// # Example
    /// ```
    /// use reportdesk_core::models::Slug;
    ///
    /// assert!(Slug::new("monthly-sales").is_ok());
    /// assert!(Slug::new("Monthly Sales").is_err());
    /// assert!(Slug::new("-sales").is_err());
    /// assert!(Slug::new("2024").is_err());
    /// ```
    pub fn new(s: &str) -> Result<Self, ValidationError> {
        if s.is_empty() {
            return Err(ValidationError::Empty { field: "slug" });
        }

        if s.len() > MAX_NAME_LEN {
            return Err(ValidationError::TooLong {
                field: "slug",
                max: MAX_NAME_LEN,
            });
        }

        if !SLUG_RE.is_match(s) {
            return Err(ValidationError::InvalidFormat {
                field: "slug",
                reason: "must be lowercase alphanumeric with hyphens/underscores, starting with alphanumeric",
            });
        }

        // Route keys that parse as numbers are ids
        if is_numeric(s) {
            return Err(ValidationError::InvalidFormat {
                field: "slug",
                reason: "must contain at least one letter, hyphen or underscore",
            });
        }

        Ok(Self(s.to_owned()))
    }

    /// Derive a slug from a display name, using `fallback` when the name
    /// has no ASCII alphanumerics at all. All-digit names are prefixed
    /// with `fallback`.
    pub fn from_name(name: &str, fallback: &str) -> Self {
        let slug = slugify(name);
        if slug.is_empty() {
            Self(fallback.to_owned())
        } else if is_numeric(&slug) {
            let mut prefixed = format!("{fallback}-{slug}");
            prefixed.truncate(MAX_NAME_LEN);
            Self(prefixed)
        } else {
            Self(slug)
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl AsRef<str> for Slug {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Slug {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

fn is_numeric(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

pub fn slugify(input: &str) -> String {
    let mut slug = String::new();
    let mut last_was_dash = false;

    for ch in input.chars() {
        if ch.is_ascii_alphanumeric() {
            slug.push(ch.to_ascii_lowercase());
            last_was_dash = false;
        } else if ch.is_ascii() && !slug.is_empty() && !last_was_dash {
            slug.push('-');
            last_was_dash = true;
        }
        // Non-ASCII characters are skipped entirely.
    }

    while slug.ends_with('-') {
        slug.pop();
    }

    if slug.len() > MAX_NAME_LEN {
        slug.truncate(MAX_NAME_LEN);
        while slug.ends_with('-') {
            slug.pop();
        }
    }

    slug
}

/// First of `base`, `base-2`, `base-3`, ... not present in `taken`.
pub fn next_free_slug(base: &Slug, taken: &HashSet<String>) -> Slug {
    if !taken.contains(base.as_str()) {
        return base.clone();
    }

    let mut n = 2usize;
    loop {
        let suffix = format!("-{n}");
        let mut stem = base.as_str().to_owned();
        // Keep the suffixed slug within the column limit
        if stem.len() + suffix.len() > MAX_NAME_LEN {
            stem.truncate(MAX_NAME_LEN - suffix.len());
        }
        let candidate = format!("{stem}{suffix}");
        if !taken.contains(&candidate) {
            return Slug(candidate);
        }
        n += 1;
    }
}
