use std::path::Path;

use super::ExtractionError;

/// Document-to-text abstraction (allows mocking for tests).
///
/// Returns the whole document as one string, possibly empty. A blank result
/// is not an error here; the caller decides what an empty document means.
pub trait TextSource: Send + Sync {
    fn extract(&self, path: &Path) -> Result<String, ExtractionError>;
}

/// PDF text layer abstraction, one string per page.
pub trait PdfExtractor: Send + Sync {
    fn extract_pages(&self, pdf_bytes: &[u8]) -> Result<Vec<String>, ExtractionError>;
}

/// Fixed text, ignoring the path. Used by tests and by callers that already
/// hold the document text.
pub struct StaticTextSource {
    text: String,
}

impl StaticTextSource {
    pub fn new(text: &str) -> Self {
        Self {
            text: text.to_string(),
        }
    }
}

impl TextSource for StaticTextSource {
    fn extract(&self, _path: &Path) -> Result<String, ExtractionError> {
        Ok(self.text.clone())
    }
}
