//! Image normalization and OCR adapters.

mod preprocessing;
mod tesseract;
#[cfg(feature = "onnx")]
mod onnx;

pub use preprocessing::{estimate_skew, normalize_skew_angle, rotate_bilinear, ImageNormalizer};
pub use tesseract::TesseractRecognizer;
#[cfg(feature = "onnx")]
pub use onnx::OnnxRecognizer;

use image::DynamicImage;

use crate::error::OcrError;

/// A raster ready for recognition.
#[derive(Debug, Clone)]
pub struct NormalizedImage {
    /// Normalized pixels (single channel unless grayscale was disabled).
    pub image: DynamicImage,

    /// Resolution hint passed through to the recognizer.
    pub dpi: u32,

    /// Rotation applied by deskew, in degrees.
    pub skew_degrees: Option<f32>,

    /// Normalization stages that ran, in order.
    pub stages: Vec<&'static str>,
}

impl NormalizedImage {
    /// Wrap an image without normalizing it.
    pub fn raw(image: DynamicImage, dpi: u32) -> Self {
        Self {
            image,
            dpi,
            skew_degrees: None,
            stages: Vec::new(),
        }
    }
}

/// Turns a raster into plain text.
pub trait TextRecognizer: Send + Sync {
    /// Recognizer name for logging.
    fn name(&self) -> &str;

    /// Recognize the text of a normalized image.
    fn recognize(&self, image: &NormalizedImage) -> Result<String, OcrError>;
}
