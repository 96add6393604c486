//! PDF processing module.

mod extractor;
#[cfg(feature = "pdfium")]
mod pdfium;

pub use extractor::PdfExtractor;
#[cfg(feature = "pdfium")]
pub use pdfium::PdfiumBackend;

use crate::error::PdfError;
use image::DynamicImage;

/// Result type for PDF operations.
pub type Result<T> = std::result::Result<T, PdfError>;

/// An opened PDF document.
pub trait PdfProcessor {
    /// Get the number of pages in the PDF.
    fn page_count(&self) -> u32;

    /// Extract the text layer of every page, pages separated by a line break.
    fn extract_text(&self) -> Result<String>;

    /// Produce a raster of the page for OCR.
    fn render_page(&self, page: u32, dpi: u32) -> Result<DynamicImage>;
}

/// Capability for opening PDF documents.
pub trait PdfBackend: Send + Sync {
    /// Backend name for logging.
    fn name(&self) -> &str;

    /// Parse a PDF from bytes.
    fn open(&self, data: &[u8]) -> Result<Box<dyn PdfProcessor>>;
}

/// PDF backend built on lopdf and pdf-extract. Scanned pages are read
/// from their embedded image rather than rendered.
#[derive(Debug, Clone, Copy, Default)]
pub struct LopdfBackend;

impl LopdfBackend {
    pub fn new() -> Self {
        Self
    }
}

impl PdfBackend for LopdfBackend {
    fn name(&self) -> &str {
        "lopdf"
    }

    fn open(&self, data: &[u8]) -> Result<Box<dyn PdfProcessor>> {
        let mut extractor = PdfExtractor::new();
        extractor.load(data)?;
        Ok(Box::new(extractor))
    }
}
