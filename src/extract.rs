//! Text extraction for ingested files.
//!
//! Ingestion supplies bytes + content type; this module returns plain UTF-8
//! text. PDFs go through `pdf-extract`; text-like files are decoded as UTF-8.

use std::path::Path;

pub const MIME_PDF: &str = "application/pdf";
pub const MIME_TEXT: &str = "text/plain";
pub const MIME_MARKDOWN: &str = "text/markdown";
pub const MIME_CSV: &str = "text/csv";
pub const MIME_HTML: &str = "text/html";
pub const MIME_JSON: &str = "application/json";
pub const MIME_XML: &str = "application/xml";

/// Extraction error. The caller reports it; nothing panics.
#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("unsupported content-type: {0}")]
    UnsupportedContentType(String),
    #[error("PDF extraction failed: {0}")]
    Pdf(String),
    #[error("file is not valid UTF-8 text: {0}")]
    Utf8(#[from] std::str::Utf8Error),
    #[error("could not extract any text")]
    NoText,
}

/// Guess a content type from a file extension. `None` for unsupported files.
pub fn content_type_for_path(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "pdf" => Some(MIME_PDF),
        "txt" | "log" => Some(MIME_TEXT),
        "md" | "markdown" => Some(MIME_MARKDOWN),
        "csv" => Some(MIME_CSV),
        "html" | "htm" => Some(MIME_HTML),
        "json" => Some(MIME_JSON),
        "xml" => Some(MIME_XML),
        _ => None,
    }
}

/// Content type for an uploaded file.
///
/// The file name's extension wins; otherwise a declared type is accepted
/// when it is one this module can read. Declared parameters such as
/// `; charset=utf-8` are ignored.
pub fn resolve_content_type(file_name: &str, declared: Option<&str>) -> Option<&'static str> {
    if let Some(ct) = content_type_for_path(Path::new(file_name)) {
        return Some(ct);
    }
    let declared = declared?.split(';').next()?.trim().to_ascii_lowercase();
    [
        MIME_PDF,
        MIME_TEXT,
        MIME_MARKDOWN,
        MIME_CSV,
        MIME_HTML,
        MIME_JSON,
        MIME_XML,
    ]
    .into_iter()
    .find(|known| *known == declared)
}

/// Extracts plain text from file content.
pub fn extract_text(bytes: &[u8], content_type: &str) -> Result<String, ExtractError> {
    match content_type {
        MIME_PDF => extract_pdf(bytes),
        ct if ct.starts_with("text/") || ct == MIME_JSON || ct == MIME_XML => {
            Ok(std::str::from_utf8(bytes)?.to_string())
        }
        _ => Err(ExtractError::UnsupportedContentType(
            content_type.to_string(),
        )),
    }
}

/// Like [`extract_text`], but whitespace-only output is [`ExtractError::NoText`].
pub fn extract_document(bytes: &[u8], content_type: &str) -> Result<String, ExtractError> {
    let text = extract_text(bytes, content_type)?;
    if text.trim().is_empty() {
        return Err(ExtractError::NoText);
    }
    Ok(text)
}

fn extract_pdf(bytes: &[u8]) -> Result<String, ExtractError> {
    pdf_extract::extract_text_from_mem(bytes).map_err(|e| ExtractError::Pdf(e.to_string()))
}
