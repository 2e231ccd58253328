pub mod types;
pub mod sanitize;
pub mod pdf;
pub mod text_only;

pub use types::*;
pub use sanitize::*;
pub use pdf::*;
pub use text_only::*;

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("Cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("PDF parsing failed: {0}")]
    PdfParsing(String),

    #[error("Text encoding error: {0}")]
    EncodingError(String),

    #[error("Unsupported format for extraction: {0}")]
    UnsupportedFormat(String),
}
