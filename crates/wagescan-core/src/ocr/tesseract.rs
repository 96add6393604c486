//! OCR through the `tesseract` command-line binary.

use std::io::ErrorKind;
use std::path::PathBuf;
use std::process::Command;
use std::time::Instant;

use image::ImageFormat;
use tracing::{debug, info};

use super::{NormalizedImage, TextRecognizer};
use crate::error::OcrError;
use crate::models::config::OcrConfig;

/// Recognizer that shells out to tesseract.
///
/// The normalized raster is written to a temporary PNG that is removed when
/// the call returns.
#[derive(Debug, Clone)]
pub struct TesseractRecognizer {
    binary: PathBuf,
    language: String,
    page_segmentation_mode: u8,
}

impl TesseractRecognizer {
    /// Tesseract from `PATH`, English, single uniform block of text.
    pub fn new() -> Self {
        Self {
            binary: PathBuf::from("tesseract"),
            language: "eng".to_string(),
            page_segmentation_mode: 6,
        }
    }

    /// Create a recognizer from the OCR section of the configuration.
    pub fn from_config(config: &OcrConfig) -> Self {
        Self {
            binary: config.tesseract_path.clone(),
            language: config.language.clone(),
            page_segmentation_mode: config.page_segmentation_mode,
        }
    }

    /// Set the executable to run.
    pub fn with_binary(mut self, binary: impl Into<PathBuf>) -> Self {
        self.binary = binary.into();
        self
    }

    /// Set the language pack.
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    /// Set the page segmentation mode.
    pub fn with_page_segmentation_mode(mut self, psm: u8) -> Self {
        self.page_segmentation_mode = psm;
        self
    }

    /// Whether the binary can be started.
    pub fn is_available(&self) -> bool {
        Command::new(&self.binary)
            .arg("--version")
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false)
    }
}

impl Default for TesseractRecognizer {
    fn default() -> Self {
        Self::new()
    }
}

impl TextRecognizer for TesseractRecognizer {
    fn name(&self) -> &str {
        "tesseract"
    }

    fn recognize(&self, image: &NormalizedImage) -> Result<String, OcrError> {
        let start = Instant::now();

        let input = tempfile::Builder::new()
            .prefix("wagescan-")
            .suffix(".png")
            .tempfile()
            .map_err(|e| OcrError::Preprocessing(format!("failed to create temp file: {}", e)))?;

        image
            .image
            .save_with_format(input.path(), ImageFormat::Png)
            .map_err(|e| OcrError::InvalidImage(format!("failed to write raster: {}", e)))?;

        debug!(
            "Running {} on {}x{} raster at {} dpi",
            self.binary.display(),
            image.image.width(),
            image.image.height(),
            image.dpi
        );

        let output = Command::new(&self.binary)
            .arg(input.path())
            .arg("stdout")
            .args(["--psm", &self.page_segmentation_mode.to_string()])
            .args(["-l", &self.language])
            .args(["--dpi", &image.dpi.to_string()])
            .output()
            .map_err(|e| match e.kind() {
                ErrorKind::NotFound | ErrorKind::PermissionDenied => OcrError::Unavailable(format!(
                    "cannot run {}: {}",
                    self.binary.display(),
                    e
                )),
                _ => OcrError::Failed(format!("{}: {}", self.binary.display(), e)),
            })?;

        if !output.status.success() {
            return Err(OcrError::Failed(format!(
                "tesseract exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let text = String::from_utf8_lossy(&output.stdout).into_owned();
        info!(
            "OCR complete: {} characters in {}ms",
            text.len(),
            start.elapsed().as_millis()
        );
        Ok(text)
    }
}
