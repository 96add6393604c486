//! Document ingestion: text acquisition, OCR fallback and field extraction.

use std::path::Path;
use std::time::Instant;

use image::{DynamicImage, ImageFormat};
use tracing::{debug, info, warn};

use crate::error::{ExtractionError, OcrError, PdfError, Result, W2Error};
use crate::models::config::{OcrBackend, OcrConfig, PdfConfig, WagescanConfig};
use crate::models::w2::{ContentKind, DocumentModality, IngestionResult};
use crate::ocr::{ImageNormalizer, TesseractRecognizer, TextRecognizer};
use crate::pdf::{LopdfBackend, PdfBackend, PdfProcessor};
use crate::w2::{DialectParser, W2Parser};

/// Text obtained from a document and how it was obtained.
struct Acquired {
    text: String,
    modality: DocumentModality,
    /// Backend or recognizer that produced the text.
    source: String,
}

/// End-to-end W-2 ingestion.
///
/// Holds only configuration and capability handles, so a single instance can
/// be shared between threads.
pub struct W2Pipeline {
    pdf_backend: Option<Box<dyn PdfBackend>>,
    recognizer: Option<Box<dyn TextRecognizer>>,
    normalizer: ImageNormalizer,
    parser: Box<dyn W2Parser>,
    pdf_config: PdfConfig,
}

/// Builder for [`W2Pipeline`].
pub struct W2PipelineBuilder {
    pdf_backend: Option<Box<dyn PdfBackend>>,
    recognizer: Option<Box<dyn TextRecognizer>>,
    normalizer: ImageNormalizer,
    parser: Box<dyn W2Parser>,
    pdf_config: PdfConfig,
}

impl W2PipelineBuilder {
    /// A builder with the lopdf backend, default normalization and parser,
    /// and no recognizer.
    pub fn new() -> Self {
        Self {
            pdf_backend: Some(Box::new(LopdfBackend::new())),
            recognizer: None,
            normalizer: ImageNormalizer::new(),
            parser: Box::new(DialectParser::new()),
            pdf_config: PdfConfig::default(),
        }
    }

    /// Configure every component from a [`WagescanConfig`].
    ///
    /// A recognizer that cannot be loaded is logged and left out; scanned
    /// documents then fail as recognition-unavailable.
    pub fn from_config(config: &WagescanConfig) -> Self {
        let mut builder = Self::new()
            .with_normalizer(ImageNormalizer::from_config(&config.normalization))
            .with_parser(DialectParser::from_config(&config.extraction))
            .with_pdf_config(config.pdf.clone());
        builder.pdf_backend = Some(pdf_backend_from_config(&config.pdf));
        builder.recognizer = recognizer_from_config(&config.ocr);
        builder
    }

    /// Set the PDF backend.
    pub fn with_pdf_backend(mut self, backend: impl PdfBackend + 'static) -> Self {
        self.pdf_backend = Some(Box::new(backend));
        self
    }

    /// Build without PDF support.
    pub fn without_pdf_backend(mut self) -> Self {
        self.pdf_backend = None;
        self
    }

    /// Set the text recognizer.
    pub fn with_recognizer(mut self, recognizer: impl TextRecognizer + 'static) -> Self {
        self.recognizer = Some(Box::new(recognizer));
        self
    }

    /// Build without OCR.
    pub fn without_recognizer(mut self) -> Self {
        self.recognizer = None;
        self
    }

    /// Set the image normalizer.
    pub fn with_normalizer(mut self, normalizer: ImageNormalizer) -> Self {
        self.normalizer = normalizer;
        self
    }

    /// Set the field parser.
    pub fn with_parser(mut self, parser: impl W2Parser + 'static) -> Self {
        self.parser = Box::new(parser);
        self
    }

    /// Set the PDF text acquisition settings.
    pub fn with_pdf_config(mut self, config: PdfConfig) -> Self {
        self.pdf_config = config;
        self
    }

    pub fn build(self) -> W2Pipeline {
        W2Pipeline {
            pdf_backend: self.pdf_backend,
            recognizer: self.recognizer,
            normalizer: self.normalizer,
            parser: self.parser,
            pdf_config: self.pdf_config,
        }
    }
}

impl Default for W2PipelineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// PDFium when built in and loadable, otherwise lopdf.
fn pdf_backend_from_config(config: &PdfConfig) -> Box<dyn PdfBackend> {
    #[cfg(feature = "pdfium")]
    match crate::pdf::PdfiumBackend::new(config.pdfium_library_dir.clone()) {
        Ok(backend) => return Box::new(backend),
        Err(e) => warn!("{}, falling back to embedded page images", e),
    }
    #[cfg(not(feature = "pdfium"))]
    let _ = config;

    Box::new(LopdfBackend::new())
}

fn recognizer_from_config(config: &OcrConfig) -> Option<Box<dyn TextRecognizer>> {
    match config.backend {
        OcrBackend::Tesseract => Some(Box::new(TesseractRecognizer::from_config(config))),
        #[cfg(feature = "onnx")]
        OcrBackend::Onnx => match crate::ocr::OnnxRecognizer::from_config(config) {
            Ok(recognizer) => Some(Box::new(recognizer)),
            Err(e) => {
                warn!("ONNX recognizer not loaded: {}", e);
                None
            }
        },
        #[cfg(not(feature = "onnx"))]
        OcrBackend::Onnx => {
            warn!("Built without the onnx feature, OCR disabled");
            None
        }
        OcrBackend::None => None,
    }
}

impl W2Pipeline {
    /// Start building a pipeline.
    pub fn builder() -> W2PipelineBuilder {
        W2PipelineBuilder::new()
    }

    /// Build a pipeline from configuration.
    pub fn from_config(config: &WagescanConfig) -> Self {
        W2PipelineBuilder::from_config(config).build()
    }

    /// Name of the configured PDF backend, if any.
    pub fn pdf_backend_name(&self) -> Option<&str> {
        self.pdf_backend.as_deref().map(|b| b.name())
    }

    /// Name of the configured recognizer, if any.
    pub fn recognizer_name(&self) -> Option<&str> {
        self.recognizer.as_deref().map(|r| r.name())
    }

    /// Ingest a file. The content kind comes from the declared MIME type when
    /// given, otherwise from the file's leading bytes, then its extension.
    pub fn ingest_path(&self, path: &Path, mime: Option<&str>) -> Result<IngestionResult> {
        let data = std::fs::read(path)?;
        let kind = resolve_content_kind(&data, Some(path), mime)?;
        info!("Ingesting {} as {}", path.display(), kind.mime());
        self.ingest_bytes(&data, kind)
    }

    /// Ingest document bytes of a known content kind.
    pub fn ingest_bytes(&self, data: &[u8], kind: ContentKind) -> Result<IngestionResult> {
        let start = Instant::now();

        let acquired = match kind {
            ContentKind::Pdf => self.acquire_pdf(data)?,
            ContentKind::Png => self.acquire_image(data, ImageFormat::Png)?,
            ContentKind::Jpeg => self.acquire_image(data, ImageFormat::Jpeg)?,
        };
        let modality = acquired.modality;

        debug!(
            "Acquired {} characters via {} ({})",
            acquired.text.len(),
            modality.as_str(),
            acquired.source
        );

        let outcome = self.parser.parse(&acquired.text).map_err(|e| match e {
            ExtractionError::EmptyDocument { reason } => ExtractionError::empty(format!(
                "{} ({} via {})",
                reason,
                modality.as_str(),
                acquired.source
            )),
        })?;

        let processing_time_ms = start.elapsed().as_millis() as u64;
        info!(
            "Extracted {}/{} fields ({} layout, {}) in {}ms",
            outcome.fields.present_count(),
            crate::models::w2::W2Field::ALL.len(),
            outcome.dialect,
            modality.as_str(),
            processing_time_ms
        );

        Ok(IngestionResult {
            field_values: outcome.fields,
            modality,
            dialect: outcome.dialect,
            field_confidence: outcome.field_confidence,
            raw_text: outcome.text,
            warnings: outcome.warnings,
            processing_time_ms,
        })
    }

    /// Text layer first; OCR of the fallback page when it is too short.
    fn acquire_pdf(&self, data: &[u8]) -> Result<Acquired> {
        let backend = self
            .pdf_backend
            .as_deref()
            .ok_or(W2Error::Pdf(PdfError::NotConfigured))?;

        let document = backend
            .open(data)
            .map_err(|e| W2Error::UnreadableDocument(format!("{}: {}", backend.name(), e)))?;
        debug!(
            "Opened PDF with {} ({} pages)",
            backend.name(),
            document.page_count()
        );

        let text = match document.extract_text() {
            Ok(text) => text,
            Err(e) => {
                warn!("Text layer extraction failed: {}", e);
                String::new()
            }
        };

        let stripped_len = text.trim().chars().count();
        if stripped_len >= self.pdf_config.min_text_length {
            return Ok(Acquired {
                text,
                modality: DocumentModality::PdfText,
                source: backend.name().to_string(),
            });
        }

        info!(
            "Text layer has {} characters (< {}), falling back to OCR of page {}",
            stripped_len, self.pdf_config.min_text_length, self.pdf_config.fallback_page
        );

        self.ocr_pdf_page(document.as_ref())
    }

    fn ocr_pdf_page(&self, document: &dyn PdfProcessor) -> Result<Acquired> {
        let recognizer = self.recognizer()?;
        let page_number = self.pdf_config.fallback_page;
        let page = document.render_page(page_number, self.pdf_config.render_dpi)?;
        Ok(Acquired {
            text: self.recognize(recognizer, &page)?,
            modality: DocumentModality::PdfScanned,
            source: format!("{} on page {}", recognizer.name(), page_number),
        })
    }

    fn acquire_image(&self, data: &[u8], format: ImageFormat) -> Result<Acquired> {
        let recognizer = self.recognizer()?;
        let image = image::load_from_memory_with_format(data, format)?;
        debug!("Decoded {}x{} image", image.width(), image.height());
        Ok(Acquired {
            text: self.recognize(recognizer, &image)?,
            modality: DocumentModality::Image,
            source: recognizer.name().to_string(),
        })
    }

    fn recognizer(&self) -> Result<&dyn TextRecognizer> {
        self.recognizer.as_deref().ok_or_else(|| {
            W2Error::Ocr(OcrError::Unavailable(
                "no text recognizer configured".to_string(),
            ))
        })
    }

    fn recognize(&self, recognizer: &dyn TextRecognizer, image: &DynamicImage) -> Result<String> {
        let normalized = self.normalizer.normalize(image);
        if let Some(angle) = normalized.skew_degrees {
            debug!("Deskewed by {:.2} degrees", angle);
        }
        debug!("Recognizing with {}", recognizer.name());
        Ok(recognizer.recognize(&normalized)?)
    }
}

/// Resolve the content kind of a document.
///
/// A declared MIME type is authoritative and must be supported. Without one,
/// the leading bytes are sniffed, then the file extension is consulted.
pub fn resolve_content_kind(
    data: &[u8],
    path: Option<&Path>,
    mime: Option<&str>,
) -> Result<ContentKind> {
    if let Some(mime) = mime {
        return ContentKind::from_mime(mime)
            .ok_or_else(|| W2Error::UnsupportedMediaType(mime.to_string()));
    }

    ContentKind::sniff(data)
        .or_else(|| path.and_then(ContentKind::from_path))
        .ok_or_else(|| {
            W2Error::UnsupportedMediaType(
                path.map(|p| p.display().to_string())
                    .unwrap_or_else(|| "unrecognized content".to_string()),
            )
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::w2::{LayoutDialect, W2Field};
    use crate::ocr::NormalizedImage;
    use crate::pdf;
    use pretty_assertions::assert_eq;
    use rust_decimal::Decimal;
    use std::io::Cursor;

    const CLEAN_TEXT: &str = "Employee's social security number: 123-45-6789 \
        Employer identification number (EIN): 12-3456789 \
        Wages, tips, other compensation: $50,000.00 \
        Federal income tax withheld: $5,000.00";

    struct FixedRecognizer(&'static str);

    impl TextRecognizer for FixedRecognizer {
        fn name(&self) -> &str {
            "fixed"
        }

        fn recognize(&self, _image: &NormalizedImage) -> std::result::Result<String, OcrError> {
            Ok(self.0.to_string())
        }
    }

    /// Opens every input as a one-page document with the given text layer
    /// and an optional page image.
    struct StubBackend {
        text: &'static str,
        has_image: bool,
    }

    struct StubDocument {
        text: &'static str,
        has_image: bool,
    }

    impl PdfBackend for StubBackend {
        fn name(&self) -> &str {
            "stub"
        }

        fn open(&self, _data: &[u8]) -> pdf::Result<Box<dyn PdfProcessor>> {
            Ok(Box::new(StubDocument {
                text: self.text,
                has_image: self.has_image,
            }))
        }
    }

    impl PdfProcessor for StubDocument {
        fn page_count(&self) -> u32 {
            1
        }

        fn extract_text(&self) -> pdf::Result<String> {
            Ok(self.text.to_string())
        }

        fn render_page(&self, page: u32, _dpi: u32) -> pdf::Result<DynamicImage> {
            if self.has_image {
                Ok(DynamicImage::new_luma8(64, 64))
            } else {
                Err(PdfError::ImageExtraction(format!("No images found on page {}", page)))
            }
        }
    }

    fn png_bytes() -> Vec<u8> {
        let mut buf = Cursor::new(Vec::new());
        DynamicImage::new_luma8(32, 32)
            .write_to(&mut buf, ImageFormat::Png)
            .unwrap();
        buf.into_inner()
    }

    fn pipeline(backend: StubBackend, recognizer: Option<&'static str>) -> W2Pipeline {
        let builder = W2Pipeline::builder()
            .with_pdf_backend(backend)
            .with_normalizer(ImageNormalizer::passthrough());
        match recognizer {
            Some(text) => builder.with_recognizer(FixedRecognizer(text)).build(),
            None => builder.build(),
        }
    }

    #[test]
    fn test_pdf_text_layer_is_used() {
        let pipeline = pipeline(
            StubBackend {
                text: CLEAN_TEXT,
                has_image: false,
            },
            Some("should not be used"),
        );

        let result = pipeline.ingest_bytes(b"%PDF-1.7", ContentKind::Pdf).unwrap();
        assert_eq!(result.modality, DocumentModality::PdfText);
        assert_eq!(result.dialect, LayoutDialect::Clean);
        assert_eq!(result.field_values.wages, Decimal::new(5000000, 2));
    }

    #[test]
    fn test_short_text_layer_falls_back_to_ocr() {
        let pipeline = pipeline(
            StubBackend {
                text: "W-2",
                has_image: true,
            },
            Some(CLEAN_TEXT),
        );

        let result = pipeline.ingest_bytes(b"%PDF-1.7", ContentKind::Pdf).unwrap();
        assert_eq!(result.modality, DocumentModality::PdfScanned);
        assert_eq!(result.field_values.employee_ssn.as_deref(), Some("123-45-6789"));
    }

    #[test]
    fn test_short_text_layer_reports_fallback_failure() {
        let pipeline = pipeline(
            StubBackend {
                text: "Copy B",
                has_image: true,
            },
            None,
        );
        let err = pipeline.ingest_bytes(b"%PDF-1.7", ContentKind::Pdf).unwrap_err();
        assert!(matches!(err, W2Error::Ocr(OcrError::Unavailable(_))));
        assert_eq!(err.kind(), "recognition_unavailable");

        let pipeline = self::pipeline(
            StubBackend {
                text: "Wages 100.00",
                has_image: false,
            },
            Some(CLEAN_TEXT),
        );
        let err = pipeline.ingest_bytes(b"%PDF-1.7", ContentKind::Pdf).unwrap_err();
        assert!(matches!(err, W2Error::Pdf(PdfError::ImageExtraction(_))));
    }

    #[test]
    fn test_unparseable_pdf_is_unreadable() {
        let pipeline = W2Pipeline::builder().build();
        let err = pipeline
            .ingest_bytes(b"%PDF-1.7 truncated", ContentKind::Pdf)
            .unwrap_err();
        assert!(matches!(err, W2Error::UnreadableDocument(ref m) if m.starts_with("lopdf: ")));
        assert_eq!(err.kind(), "unreadable_document");
    }

    #[test]
    fn test_empty_ocr_text_names_its_source() {
        let pipeline = pipeline(
            StubBackend {
                text: "",
                has_image: true,
            },
            Some(" \n "),
        );

        let err = pipeline.ingest_bytes(b"%PDF-1.7", ContentKind::Pdf).unwrap_err();
        assert_eq!(err.kind(), "document_parse_error");
        assert!(
            err.to_string().contains("(pdf_scanned via fixed on page 1)"),
            "got {}",
            err
        );
    }

    #[test]
    fn test_field_confidence_is_reported() {
        let pipeline = pipeline(
            StubBackend {
                text: CLEAN_TEXT,
                has_image: false,
            },
            None,
        );

        let result = pipeline.ingest_bytes(b"%PDF-1.7", ContentKind::Pdf).unwrap();
        assert_eq!(result.field_confidence.get(&W2Field::Wages), Some(&0.95));
        assert!(!result.field_confidence.contains_key(&W2Field::State));
        assert_eq!(result.field_confidence.len(), result.field_values.present_count());
    }

    #[test]
    fn test_scanned_pdf_without_recognizer_is_unavailable() {
        let pipeline = pipeline(
            StubBackend {
                text: "",
                has_image: true,
            },
            None,
        );

        let err = pipeline.ingest_bytes(b"%PDF-1.7", ContentKind::Pdf).unwrap_err();
        assert_eq!(err.kind(), "recognition_unavailable");
    }

    #[test]
    fn test_image_goes_through_ocr() {
        let pipeline = pipeline(
            StubBackend {
                text: "",
                has_image: false,
            },
            Some(CLEAN_TEXT),
        );

        let result = pipeline.ingest_bytes(&png_bytes(), ContentKind::Png).unwrap();
        assert_eq!(result.modality, DocumentModality::Image);
        assert_eq!(result.field_values.employer_ein.as_deref(), Some("12-3456789"));
    }

    #[test]
    fn test_undecodable_image_is_unreadable() {
        let pipeline = pipeline(
            StubBackend {
                text: "",
                has_image: false,
            },
            Some(CLEAN_TEXT),
        );

        let err = pipeline.ingest_bytes(b"not a jpeg", ContentKind::Jpeg).unwrap_err();
        assert_eq!(err.kind(), "unreadable_document");
    }

    #[test]
    fn test_missing_pdf_backend() {
        let pipeline = W2Pipeline::builder().without_pdf_backend().build();
        let err = pipeline.ingest_bytes(b"%PDF-1.7", ContentKind::Pdf).unwrap_err();
        assert!(matches!(err, W2Error::Pdf(PdfError::NotConfigured)));
        assert_eq!(err.kind(), "unreadable_document");
    }

    #[test]
    fn test_resolve_content_kind() {
        assert_eq!(
            resolve_content_kind(b"", None, Some("application/pdf")).unwrap(),
            ContentKind::Pdf
        );
        assert_eq!(
            resolve_content_kind(b"%PDF-1.4", Some(Path::new("scan.png")), None).unwrap(),
            ContentKind::Pdf
        );
        assert_eq!(
            resolve_content_kind(b"????", Some(Path::new("scan.jpg")), None).unwrap(),
            ContentKind::Jpeg
        );

        let err = resolve_content_kind(b"%PDF-1.4", None, Some("text/plain")).unwrap_err();
        assert!(matches!(err, W2Error::UnsupportedMediaType(ref m) if m == "text/plain"));
        assert_eq!(err.kind(), "unsupported_media_type");

        assert!(resolve_content_kind(b"????", Some(Path::new("notes.txt")), None).is_err());
    }

    #[test]
    fn test_from_config_selects_recognizer() {
        let mut config = WagescanConfig::default();
        assert_eq!(W2Pipeline::from_config(&config).recognizer_name(), Some("tesseract"));

        config.ocr.backend = OcrBackend::None;
        assert_eq!(W2Pipeline::from_config(&config).recognizer_name(), None);

        config.ocr.backend = OcrBackend::Onnx;
        config.ocr.model_dir = "/nonexistent/wagescan-models".into();
        assert_eq!(W2Pipeline::from_config(&config).recognizer_name(), None);
    }

    #[test]
    fn test_from_config_always_has_pdf_backend() {
        let mut config = WagescanConfig::default();
        config.pdf.pdfium_library_dir = Some("/nonexistent/pdfium".into());

        let pipeline = W2Pipeline::from_config(&config);
        let name = pipeline.pdf_backend_name();
        if cfg!(feature = "pdfium") {
            assert!(matches!(name, Some("pdfium") | Some("lopdf")), "got {:?}", name);
        } else {
            assert_eq!(name, Some("lopdf"));
        }
        assert_eq!(W2Pipeline::builder().build().pdf_backend_name(), Some("lopdf"));
    }

    #[test]
    fn test_pipeline_is_shareable() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<W2Pipeline>();
    }
}
