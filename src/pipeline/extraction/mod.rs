pub mod types;
pub mod confidence;
pub mod preprocess;
pub mod pdf;
pub mod pdfium;
pub mod ocr;
pub mod orchestrator;

pub use types::*;
pub use confidence::*;
pub use pdf::*;
pub use ocr::*;
pub use orchestrator::*;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("Invalid document: {0}")]
    DocumentInvalid(#[from] InvalidDocument),

    #[error("Text extraction failed: {0}")]
    TextExtractionFailed(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("OCR unavailable: {0}")]
    OcrUnavailable(String),

    #[error("OCR processing failed: {0}")]
    OcrProcessing(String),

    #[error("PDF rendering failed on page {page}: {reason}")]
    PdfRendering { page: usize, reason: String },

    #[error("Image processing error: {0}")]
    ImageProcessing(String),
}

/// Human-readable cause of a structural document rejection.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InvalidDocument {
    #[error("file too small ({size} bytes)")]
    TooSmall { size: usize },

    #[error("missing PDF signature")]
    BadSignature,

    #[error("document is encrypted")]
    Encrypted,

    #[error("document is corrupted: {0}")]
    Corrupted(String),

    #[error("document has no pages")]
    NoPages,

    #[error("first page is unreadable: {0}")]
    FirstPageUnreadable(String),
}
