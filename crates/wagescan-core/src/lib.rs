//! Core library for W-2 wage statement ingestion.
//!
//! This crate provides:
//! - Text acquisition from digital and scanned PDFs and from images
//! - Image normalization (grayscale, denoise, auto-contrast, deskew)
//! - OCR adapters (tesseract binary, pure Rust ONNX models)
//! - Layout dialect classification and table-driven W-2 field extraction

pub mod error;
pub mod models;
pub mod pdf;
pub mod ocr;
pub mod w2;
pub mod pipeline;

pub use error::{ExtractionError, OcrError, PdfError, Result, W2Error};
pub use models::config::WagescanConfig;
pub use models::w2::{
    ContentKind, DocumentModality, ExtractionResult, IngestionResult, LayoutDialect, W2Field,
};
pub use pdf::{LopdfBackend, PdfBackend, PdfExtractor, PdfProcessor};
#[cfg(feature = "pdfium")]
pub use pdf::PdfiumBackend;
pub use ocr::{ImageNormalizer, NormalizedImage, TesseractRecognizer, TextRecognizer};
#[cfg(feature = "onnx")]
pub use ocr::OnnxRecognizer;
pub use pipeline::{W2Pipeline, W2PipelineBuilder};
pub use w2::{classify, normalize_whitespace, DialectParser, W2Parser};
