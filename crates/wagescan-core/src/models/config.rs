//! Configuration structures for the ingestion pipeline.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main configuration for the wagescan pipeline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WagescanConfig {
    /// PDF text acquisition configuration.
    pub pdf: PdfConfig,

    /// Image normalization configuration.
    pub normalization: NormalizationConfig,

    /// OCR adapter configuration.
    pub ocr: OcrConfig,

    /// Field extraction configuration.
    pub extraction: ExtractionConfig,
}

/// PDF processing configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PdfConfig {
    /// Minimum stripped text length to trust the embedded text layer.
    pub min_text_length: usize,

    /// DPI hint for the page raster used by the OCR fallback.
    pub render_dpi: u32,

    /// Page rendered for the OCR fallback (1-indexed).
    pub fallback_page: u32,

    /// Directory holding the PDFium library. The system library is used
    /// when unset. Only read by builds with the `pdfium` feature.
    pub pdfium_library_dir: Option<PathBuf>,
}

impl Default for PdfConfig {
    fn default() -> Self {
        Self {
            min_text_length: 50,
            render_dpi: 300,
            fallback_page: 1,
            pdfium_library_dir: None,
        }
    }
}

/// Image normalization configuration. Every stage can be switched off.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizationConfig {
    /// Convert to single-channel luma.
    pub grayscale: bool,

    /// Apply a median filter.
    pub denoise: bool,

    /// Stretch intensities to the full range.
    pub autocontrast: bool,

    /// Detect the dominant text angle and rotate it level.
    pub deskew: bool,

    /// Median filter radius (1 = 3x3 window).
    pub median_radius: u32,

    /// Percentage of the histogram ignored at each end by auto-contrast.
    pub autocontrast_cutoff: f32,

    /// Skew angles below this (degrees) are left alone.
    pub min_skew_degrees: f32,

    /// Resolution hint attached to the normalized raster.
    pub dpi: u32,
}

impl Default for NormalizationConfig {
    fn default() -> Self {
        Self {
            grayscale: true,
            denoise: true,
            autocontrast: true,
            deskew: true,
            median_radius: 1,
            autocontrast_cutoff: 0.0,
            min_skew_degrees: 0.1,
            dpi: 300,
        }
    }
}

/// Which recognition capability the pipeline is built with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OcrBackend {
    /// The `tesseract` binary.
    #[default]
    Tesseract,
    /// PaddleOCR ONNX models run in pure Rust.
    Onnx,
    /// No OCR; scanned documents fail as unreadable.
    None,
}

impl std::str::FromStr for OcrBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "tesseract" => Ok(OcrBackend::Tesseract),
            "onnx" => Ok(OcrBackend::Onnx),
            "none" | "off" => Ok(OcrBackend::None),
            other => Err(format!("unknown OCR backend: {}", other)),
        }
    }
}

/// OCR adapter configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrConfig {
    /// Recognition backend.
    pub backend: OcrBackend,

    /// Path or name of the tesseract executable.
    pub tesseract_path: PathBuf,

    /// Tesseract language pack.
    pub language: String,

    /// Tesseract page segmentation mode (6 = single uniform block of text).
    pub page_segmentation_mode: u8,

    /// Directory with det.onnx, latin_rec.onnx and latin_dict.txt.
    pub model_dir: PathBuf,

    /// Keep `[UNK]` tokens emitted by the ONNX recognizer.
    pub keep_unk: bool,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            backend: OcrBackend::default(),
            tesseract_path: PathBuf::from("tesseract"),
            language: "eng".to_string(),
            page_segmentation_mode: 6,
            model_dir: PathBuf::from("models"),
            keep_unk: false,
        }
    }
}

/// Field extraction configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Warn about SSNs and EINs that cannot have been issued.
    pub validate_identifiers: bool,

    /// Warn about amounts that contradict each other (tax above wages).
    pub sanity_checks: bool,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            validate_identifiers: true,
            sanity_checks: true,
        }
    }
}

impl WagescanConfig {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &std::path::Path) -> Result<Self, std::io::Error> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(|e| {
            std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())
        })
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: &std::path::Path) -> Result<(), std::io::Error> {
        let content = serde_json::to_string_pretty(self).map_err(|e| {
            std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())
        })?;
        std::fs::write(path, content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: WagescanConfig =
            serde_json::from_str(r#"{"ocr": {"backend": "none"}, "pdf": {"min_text_length": 10}}"#)
                .unwrap();
        assert_eq!(config.ocr.backend, OcrBackend::None);
        assert_eq!(config.ocr.page_segmentation_mode, 6);
        assert_eq!(config.pdf.min_text_length, 10);
        assert_eq!(config.pdf.render_dpi, 300);
        assert!(config.normalization.deskew);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        let mut config = WagescanConfig::default();
        config.normalization.median_radius = 2;
        config.save(&path).unwrap();

        let loaded = WagescanConfig::from_file(&path).unwrap();
        assert_eq!(loaded.normalization.median_radius, 2);
    }

    #[test]
    fn test_backend_from_str() {
        assert_eq!("Tesseract".parse::<OcrBackend>(), Ok(OcrBackend::Tesseract));
        assert_eq!("off".parse::<OcrBackend>(), Ok(OcrBackend::None));
        assert!("paddle".parse::<OcrBackend>().is_err());
    }
}
