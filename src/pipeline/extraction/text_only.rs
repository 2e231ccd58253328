//! File-backed text source: digital PDF text layer or UTF-8 text files.
//!
//! No OCR. A scanned PDF yields blank text, which the pipeline reports as an
//! empty document.

use std::path::Path;

use super::pdf::{join_pages, PdfTextExtractor};
use super::sanitize::sanitize_extracted_text;
use super::types::{PdfExtractor, TextSource};
use super::ExtractionError;

/// Extensions we know are binary and cannot be read as text.
const BINARY_EXTENSIONS: &[&str] = &[
    "doc", "docx", "odt", "xls", "xlsx", "png", "jpg", "jpeg", "tif", "tiff",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileCategory {
    Pdf,
    PlainText,
    Unsupported,
}

impl FileCategory {
    pub fn from_path(path: &Path) -> Self {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();

        if ext == "pdf" {
            FileCategory::Pdf
        } else if BINARY_EXTENSIONS.contains(&ext.as_str()) {
            FileCategory::Unsupported
        } else {
            FileCategory::PlainText
        }
    }
}

/// Reads a document from disk and returns its sanitized text.
pub struct FileTextSource {
    pdf: Box<dyn PdfExtractor>,
}

impl Default for FileTextSource {
    fn default() -> Self {
        Self::new(Box::new(PdfTextExtractor))
    }
}

impl FileTextSource {
    pub fn new(pdf: Box<dyn PdfExtractor>) -> Self {
        Self { pdf }
    }
}

impl TextSource for FileTextSource {
    fn extract(&self, path: &Path) -> Result<String, ExtractionError> {
        let category = FileCategory::from_path(path);
        if category == FileCategory::Unsupported {
            return Err(ExtractionError::UnsupportedFormat(path.display().to_string()));
        }

        let bytes = std::fs::read(path).map_err(|source| ExtractionError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let raw = match category {
            FileCategory::Pdf => {
                let pages = self.pdf.extract_pages(&bytes)?;
                tracing::debug!(pages = pages.len(), "PDF text layer extracted");
                join_pages(&pages)
            }
            _ => String::from_utf8(bytes)
                .map_err(|e| ExtractionError::EncodingError(e.to_string()))?,
        };

        let text = sanitize_extracted_text(&raw);

        tracing::info!(
            path = %path.display(),
            category = ?category,
            text_length = text.len(),
            "Document text extracted"
        );

        Ok(text)
    }
}
