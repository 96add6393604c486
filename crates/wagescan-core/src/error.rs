//! Error types for the wagescan-core library.

use thiserror::Error;

/// Main error type for the wagescan library.
#[derive(Error, Debug)]
pub enum W2Error {
    /// No text could be obtained from the document at all.
    #[error("unreadable document: {0}")]
    UnreadableDocument(String),

    /// The declared or sniffed content kind is not one we ingest.
    #[error("unsupported media type: {0}")]
    UnsupportedMediaType(String),

    /// PDF processing error.
    #[error("PDF error: {0}")]
    Pdf(#[from] PdfError),

    /// OCR processing error.
    #[error("OCR error: {0}")]
    Ocr(#[from] OcrError),

    /// Field extraction error.
    #[error("extraction error: {0}")]
    Extraction(#[from] ExtractionError),

    /// Image decoding error.
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

impl W2Error {
    /// Stable short code for the error, suitable for machine-readable output.
    pub fn kind(&self) -> &'static str {
        match self {
            W2Error::UnreadableDocument(_) => "unreadable_document",
            W2Error::UnsupportedMediaType(_) => "unsupported_media_type",
            W2Error::Pdf(_) => "unreadable_document",
            W2Error::Ocr(OcrError::Unavailable(_)) => "recognition_unavailable",
            W2Error::Ocr(_) => "recognition_failed",
            W2Error::Extraction(_) => "document_parse_error",
            W2Error::Image(_) => "unreadable_document",
            W2Error::Io(_) => "io_error",
            W2Error::Config(_) => "config_error",
        }
    }

    /// Whether the failure is attributable to the submitted document rather
    /// than to the environment the pipeline runs in.
    pub fn is_client_error(&self) -> bool {
        !matches!(self, W2Error::Io(_) | W2Error::Config(_))
    }
}

/// Errors related to PDF processing.
#[derive(Error, Debug)]
pub enum PdfError {
    /// Failed to open/parse the PDF file.
    #[error("failed to parse PDF: {0}")]
    Parse(String),

    /// Failed to extract text from PDF.
    #[error("failed to extract text: {0}")]
    TextExtraction(String),

    /// Failed to extract a page image from the PDF.
    #[error("failed to extract images: {0}")]
    ImageExtraction(String),

    /// The PDF is encrypted and cannot be processed.
    #[error("PDF is encrypted")]
    Encrypted,

    /// The PDF is empty or has no pages.
    #[error("PDF has no pages")]
    NoPages,

    /// Invalid page number requested.
    #[error("invalid page number: {0}")]
    InvalidPage(u32),

    /// No PDF backend was configured for the pipeline.
    #[error("no PDF backend configured")]
    NotConfigured,

    /// The backend's native library could not be loaded.
    #[error("PDF backend unavailable: {0}")]
    Unavailable(String),
}

/// Errors related to OCR processing.
#[derive(Error, Debug)]
pub enum OcrError {
    /// No recognition capability is installed or configured.
    #[error("recognition unavailable: {0}")]
    Unavailable(String),

    /// The recognition engine errored on the given image.
    #[error("recognition failed: {0}")]
    Failed(String),

    /// Image preprocessing failed.
    #[error("preprocessing failed: {0}")]
    Preprocessing(String),

    /// Invalid image format or dimensions.
    #[error("invalid image: {0}")]
    InvalidImage(String),
}

/// Errors related to W-2 field extraction.
#[derive(Error, Debug)]
pub enum ExtractionError {
    /// Nothing left to extract from after whitespace normalization.
    #[error("document parse error: {reason}")]
    EmptyDocument { reason: String },
}

impl ExtractionError {
    pub fn empty(reason: impl Into<String>) -> Self {
        Self::EmptyDocument {
            reason: reason.into(),
        }
    }
}

/// Result type for the wagescan library.
pub type Result<T> = std::result::Result<T, W2Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        let err = W2Error::from(OcrError::Unavailable("tesseract".into()));
        assert_eq!(err.kind(), "recognition_unavailable");
        assert!(err.is_client_error());

        let err = W2Error::from(OcrError::Failed("exit status 1".into()));
        assert_eq!(err.kind(), "recognition_failed");

        let err = W2Error::from(ExtractionError::empty("Empty text extracted from document"));
        assert_eq!(err.kind(), "document_parse_error");
        assert!(err.to_string().contains("Empty text extracted"));

        let err = W2Error::Config("bad backend".into());
        assert!(!err.is_client_error());
    }
}
