//! PDF backend that renders pages through PDFium.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use image::{DynamicImage, RgbaImage};
use lazy_static::lazy_static;
use pdfium_render::prelude::*;
use tracing::debug;

use super::{PdfBackend, PdfProcessor, Result};
use crate::error::PdfError;

lazy_static! {
    // PDFium keeps global state; one caller at a time.
    static ref PDFIUM_LOCK: Mutex<()> = Mutex::new(());
}

const POINTS_PER_INCH: f32 = 72.0;

/// Pixel size of a page of `width_pt` x `height_pt` points at `dpi`.
fn raster_size(width_pt: f32, height_pt: f32, dpi: u32) -> (u32, u32) {
    let scale = dpi.max(1) as f32 / POINTS_PER_INCH;
    let width = (width_pt * scale).round().max(1.0) as u32;
    let height = (height_pt * scale).round().max(1.0) as u32;
    (width, height)
}

fn bind(library_dir: Option<&Path>) -> Result<Pdfium> {
    let bindings = match library_dir {
        Some(dir) => {
            let library = Pdfium::pdfium_platform_library_name_at_path(dir);
            debug!("Binding PDFium at {}", library.display());
            Pdfium::bind_to_library(&library).or_else(|_| Pdfium::bind_to_system_library())
        }
        None => Pdfium::bind_to_system_library(),
    }
    .map_err(|e| PdfError::Unavailable(format!("PDFium library not loaded: {}", e)))?;

    Ok(Pdfium::new(bindings))
}

/// Run `f` against a freshly loaded document while holding the PDFium lock.
fn with_document<T>(
    library_dir: Option<&Path>,
    data: &[u8],
    f: impl FnOnce(&PdfDocument<'_>) -> Result<T>,
) -> Result<T> {
    let _guard = PDFIUM_LOCK
        .lock()
        .map_err(|_| PdfError::Unavailable("PDFium lock poisoned".to_string()))?;

    let pdfium = bind(library_dir)?;
    let document = pdfium
        .load_pdf_from_byte_slice(data, None)
        .map_err(|e| PdfError::Parse(e.to_string()))?;

    f(&document)
}

/// Rasterizing backend built on the PDFium library.
///
/// Unlike [`LopdfBackend`](super::LopdfBackend), pages are rendered at the
/// requested resolution, so CCITT, JBIG2 and JPEG 2000 scans are readable.
#[derive(Debug, Clone, Default)]
pub struct PdfiumBackend {
    library_dir: Option<PathBuf>,
}

impl PdfiumBackend {
    /// Bind to the PDFium library in `library_dir`, else the system one.
    /// Fails with [`PdfError::Unavailable`] when neither can be loaded.
    pub fn new(library_dir: Option<PathBuf>) -> Result<Self> {
        {
            let _guard = PDFIUM_LOCK
                .lock()
                .map_err(|_| PdfError::Unavailable("PDFium lock poisoned".to_string()))?;
            bind(library_dir.as_deref())?;
        }
        Ok(Self { library_dir })
    }
}

impl PdfBackend for PdfiumBackend {
    fn name(&self) -> &str {
        "pdfium"
    }

    fn open(&self, data: &[u8]) -> Result<Box<dyn PdfProcessor>> {
        let page_count = with_document(self.library_dir.as_deref(), data, |document| {
            Ok(document.pages().len() as u32)
        })?;
        if page_count == 0 {
            return Err(PdfError::NoPages);
        }

        debug!("Loaded PDF with {} pages", page_count);
        Ok(Box::new(PdfiumDocument {
            library_dir: self.library_dir.clone(),
            data: data.to_vec(),
            page_count,
        }))
    }
}

/// A document opened through PDFium. The bytes are kept and reloaded per
/// call, since a loaded PDFium document borrows the library handle.
struct PdfiumDocument {
    library_dir: Option<PathBuf>,
    data: Vec<u8>,
    page_count: u32,
}

impl PdfProcessor for PdfiumDocument {
    fn page_count(&self) -> u32 {
        self.page_count
    }

    fn extract_text(&self) -> Result<String> {
        with_document(self.library_dir.as_deref(), &self.data, |document| {
            let mut pages = Vec::with_capacity(self.page_count as usize);
            for page in document.pages().iter() {
                let text = page
                    .text()
                    .map_err(|e| PdfError::TextExtraction(e.to_string()))?;
                pages.push(text.all());
            }
            Ok(pages.join("\n"))
        })
    }

    fn render_page(&self, page: u32, dpi: u32) -> Result<DynamicImage> {
        if page == 0 || page > self.page_count {
            return Err(PdfError::InvalidPage(page));
        }
        let index = PdfPageIndex::try_from(page - 1).map_err(|_| PdfError::InvalidPage(page))?;

        with_document(self.library_dir.as_deref(), &self.data, |document| {
            let pdf_page = document
                .pages()
                .get(index)
                .map_err(|e| PdfError::ImageExtraction(e.to_string()))?;

            let (width, height) = raster_size(pdf_page.width().value, pdf_page.height().value, dpi);
            let bitmap = pdf_page
                .render_with_config(
                    &PdfRenderConfig::new()
                        .set_target_width(width as i32)
                        .set_target_height(height as i32),
                )
                .map_err(|e| PdfError::ImageExtraction(e.to_string()))?;

            let rgba = RgbaImage::from_raw(width, height, bitmap.as_rgba_bytes()).ok_or_else(|| {
                PdfError::ImageExtraction(format!(
                    "PDFium bitmap does not match {}x{} for page {}",
                    width, height, page
                ))
            })?;

            debug!("Rendered page {} at {} dpi ({}x{})", page, dpi, width, height);
            Ok(DynamicImage::ImageRgba8(rgba))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raster_size_letter_page() {
        assert_eq!(raster_size(612.0, 792.0, 300), (2550, 3300));
        assert_eq!(raster_size(612.0, 792.0, 72), (612, 792));
        assert_eq!(raster_size(0.0, 0.0, 0), (1, 1));
    }

    #[test]
    fn test_missing_library_dir_is_unavailable_or_system() {
        // Without a system PDFium this must fail cleanly rather than panic.
        match PdfiumBackend::new(Some(PathBuf::from("/nonexistent/pdfium"))) {
            Ok(backend) => assert_eq!(backend.name(), "pdfium"),
            Err(e) => assert!(matches!(e, PdfError::Unavailable(_))),
        }
    }
}
