//! Text extraction for supported document formats.
//!
//! Plain text and markdown are read as UTF-8 (invalid sequences replaced);
//! PDF goes through `pdf-extract`. The loader decides which files reach
//! this module; anything else is rejected with
//! [`ExtractError::UnsupportedFormat`].

use std::path::Path;

/// Formats the loader knows how to turn into text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocFormat {
    Text,
    Markdown,
    Pdf,
}

impl DocFormat {
    /// Detect the format from the file extension (case-insensitive).
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "txt" => Some(DocFormat::Text),
            "md" | "markdown" => Some(DocFormat::Markdown),
            "pdf" => Some(DocFormat::Pdf),
            _ => None,
        }
    }
}

/// Extraction error. The indexer records it per file and moves on.
#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("unsupported file type: {0}")]
    UnsupportedFormat(String),
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("PDF extraction failed: {0}")]
    Pdf(String),
}

/// Read `path` and return its plain text.
pub fn extract_text(path: &Path) -> Result<String, ExtractError> {
    let format = DocFormat::from_path(path)
        .ok_or_else(|| ExtractError::UnsupportedFormat(path.display().to_string()))?;

    let bytes = std::fs::read(path).map_err(|source| ExtractError::Io {
        path: path.display().to_string(),
        source,
    })?;

    match format {
        DocFormat::Text | DocFormat::Markdown => Ok(String::from_utf8_lossy(&bytes).into_owned()),
        DocFormat::Pdf => extract_pdf(&bytes),
    }
}

/// `pdf-extract` panics on some malformed documents (dangling font
/// references, missing font dictionaries); a panic becomes an
/// [`ExtractError::Pdf`] like any other parse failure.
fn extract_pdf(bytes: &[u8]) -> Result<String, ExtractError> {
    let outcome = std::panic::catch_unwind(|| pdf_extract::extract_text_from_mem(bytes))
        .map_err(|payload| ExtractError::Pdf(panic_message(payload.as_ref())))?;
    outcome
        .map(|text| text.trim().to_string())
        .map_err(|e| ExtractError::Pdf(e.to_string()))
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    let detail = payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown error".to_string());
    format!("malformed document ({})", detail)
}
