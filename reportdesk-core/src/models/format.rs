//! Output formats accepted by the execute endpoint

use serde::{Deserialize, Serialize};

use super::ValidationError;

const OCTET_STREAM: &str = "application/octet-stream";

/// Output format requested from the renderer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Pdf,
    Txt,
    Xls,
    Xlsx,
    Docx,
    Html,
}

impl OutputFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Txt => "txt",
            Self::Xls => "xls",
            Self::Xlsx => "xlsx",
            Self::Docx => "docx",
            Self::Html => "html",
        }
    }

    /// Parse a format name; anything outside the supported set is rejected.
    pub fn parse(s: &str) -> Result<Self, ValidationError> {
        Self::all()
            .iter()
            .copied()
            .find(|f| f.as_str() == s)
            .ok_or_else(|| ValidationError::InvalidVariant {
                field: "format",
                value: s.to_owned(),
            })
    }

    pub fn all() -> &'static [Self] {
        &[
            Self::Pdf,
            Self::Txt,
            Self::Xls,
            Self::Xlsx,
            Self::Docx,
            Self::Html,
        ]
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            Self::Pdf => "application/pdf",
            Self::Xls => "application/vnd.ms-excel",
            Self::Xlsx => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
            Self::Docx => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
            Self::Html => "text/html",
            Self::Txt => "text/plain",
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Content type for a file extension; octet-stream when unrecognized.
pub fn content_type_for(extension: &str) -> &'static str {
    let ext = extension.trim_start_matches('.').to_ascii_lowercase();
    let ext = if ext == "htm" { "html".to_owned() } else { ext };
    OutputFormat::parse(&ext)
        .map(|f| f.content_type())
        .unwrap_or(OCTET_STREAM)
}
