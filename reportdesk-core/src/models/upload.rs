//! Report template uploads
//!
//! Templates and subreports are XML documents. Uploads are checked on
//! three things before touching storage: the file name, the declared
//! content type and the leading bytes of the body.

use super::ValidationError;

/// Default upload limit: 10240 KiB
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Content types a template upload may declare
const ALLOWED_CONTENT_TYPES: &[&str] = &["application/xml", "text/xml", "application/octet-stream"];

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

/// A validated template upload
#[derive(Debug, Clone)]
pub struct TemplateUpload {
    file_name: String,
    bytes: Vec<u8>,
}

impl TemplateUpload {
    /// Validate an uploaded file for the multipart field `field`.
    pub fn validate(
        field: &'static str,
        file_name: Option<&str>,
        content_type: Option<&str>,
        bytes: Vec<u8>,
        max_bytes: usize,
    ) -> Result<Self, ValidationError> {
        let file_name = sanitize_file_name(field, file_name.unwrap_or_default())?;

        if bytes.is_empty() {
            return Err(ValidationError::Empty { field });
        }
        if bytes.len() > max_bytes {
            return Err(ValidationError::TooLong {
                field,
                max: max_bytes,
            });
        }

        if let Some(declared) = content_type {
            let essence = declared
                .split(';')
                .next()
                .unwrap_or_default()
                .trim()
                .to_ascii_lowercase();
            if !essence.is_empty() && !ALLOWED_CONTENT_TYPES.contains(&essence.as_str()) {
                return Err(ValidationError::InvalidVariant {
                    field,
                    value: essence,
                });
            }
        }

        if !looks_like_xml(&bytes) {
            return Err(ValidationError::InvalidFormat {
                field,
                reason: "must be an XML report template",
            });
        }

        Ok(Self { file_name, bytes })
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_parts(self) -> (String, Vec<u8>) {
        (self.file_name, self.bytes)
    }
}

/// Keep only the base name of a client-supplied file name.
pub fn sanitize_file_name(field: &'static str, raw: &str) -> Result<String, ValidationError> {
    let base = raw
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim();

    if base.is_empty() {
        return Err(ValidationError::Missing { field });
    }
    if base == "." || base == ".." || base.chars().any(char::is_control) {
        return Err(ValidationError::InvalidFormat {
            field,
            reason: "invalid file name",
        });
    }
    if base.len() > super::MAX_NAME_LEN {
        return Err(ValidationError::TooLong {
            field,
            max: super::MAX_NAME_LEN,
        });
    }

    Ok(base.to_owned())
}

fn looks_like_xml(bytes: &[u8]) -> bool {
    let body = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
    body.iter()
        .find(|b| !b.is_ascii_whitespace())
        .is_some_and(|b| *b == b'<')
}
