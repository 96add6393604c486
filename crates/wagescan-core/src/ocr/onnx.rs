//! Pure Rust OCR using `pure-onnx-ocr` with PaddleOCR models.

use std::cmp::Ordering;
use std::path::Path;
use std::sync::Mutex;
use std::time::Instant;

use tracing::{debug, info};

use super::{NormalizedImage, TextRecognizer};
use crate::error::OcrError;
use crate::models::config::OcrConfig;

/// Boxes whose tops fall in the same band of this many pixels are one line.
const LINE_BAND: f32 = 20.0;

const DET_MODEL: &str = "det.onnx";
const REC_MODEL: &str = "latin_rec.onnx";
const DICTIONARY: &str = "latin_dict.txt";

/// Recognizer backed by `pure-onnx-ocr` (no external ONNX Runtime).
pub struct OnnxRecognizer {
    engine: Mutex<pure_onnx_ocr::engine::OcrEngine>,
    keep_unk: bool,
}

struct Line {
    top: f32,
    left: f32,
    text: String,
}

impl OnnxRecognizer {
    /// Load the detection model, recognition model and dictionary from a
    /// directory.
    pub fn from_dir(model_dir: &Path) -> Result<Self, OcrError> {
        let det_path = model_dir.join(DET_MODEL);
        let rec_path = model_dir.join(REC_MODEL);
        let dict_path = model_dir.join(DICTIONARY);

        for path in [&det_path, &rec_path, &dict_path] {
            if !path.exists() {
                return Err(OcrError::Unavailable(format!(
                    "model file not found: {}",
                    path.display()
                )));
            }
        }

        let engine = pure_onnx_ocr::engine::OcrEngineBuilder::new()
            .det_model_path(&det_path)
            .rec_model_path(&rec_path)
            .dictionary_path(&dict_path)
            .build()
            .map_err(|e| OcrError::Unavailable(format!("pure-onnx-ocr: {}", e)))?;

        info!("Loaded pure-onnx-ocr engine from {}", model_dir.display());

        Ok(Self {
            engine: Mutex::new(engine),
            keep_unk: false,
        })
    }

    /// Load from the configured model directory.
    pub fn from_config(config: &OcrConfig) -> Result<Self, OcrError> {
        Ok(Self::from_dir(&config.model_dir)?.with_keep_unk(config.keep_unk))
    }

    /// Keep `[UNK]` tokens instead of replacing them with spaces.
    pub fn with_keep_unk(mut self, keep: bool) -> Self {
        self.keep_unk = keep;
        self
    }
}

impl TextRecognizer for OnnxRecognizer {
    fn name(&self) -> &str {
        "pure-onnx-ocr"
    }

    fn recognize(&self, image: &NormalizedImage) -> Result<String, OcrError> {
        let start = Instant::now();

        let results = {
            let engine = self
                .engine
                .lock()
                .map_err(|_| OcrError::Failed("OCR engine lock poisoned".to_string()))?;
            engine
                .run_from_image(&image.image)
                .map_err(|e| OcrError::Failed(format!("pure-onnx-ocr: {}", e)))?
        };

        debug!("pure-onnx-ocr returned {} text regions", results.len());

        let mut lines: Vec<Line> = results
            .iter()
            .map(|r| {
                let (left, top) = r
                    .bounding_box
                    .exterior()
                    .coords()
                    .fold((f32::INFINITY, f32::INFINITY), |(x, y), c| {
                        (x.min(c.x as f32), y.min(c.y as f32))
                    });
                let text = if self.keep_unk {
                    r.text.clone()
                } else {
                    r.text.replace("[UNK]", " ")
                };
                Line { top, left, text }
            })
            .collect();

        sort_reading_order(&mut lines);

        let text = lines
            .iter()
            .map(|l| l.text.as_str())
            .collect::<Vec<_>>()
            .join("\n");

        info!(
            "OCR complete: {} text boxes in {}ms",
            lines.len(),
            start.elapsed().as_millis()
        );
        Ok(text)
    }
}

/// Top-to-bottom by line band, then left-to-right.
fn sort_reading_order(lines: &mut [Line]) {
    lines.sort_by(|a, b| {
        let row_a = (a.top / LINE_BAND) as i32;
        let row_b = (b.top / LINE_BAND) as i32;
        row_a
            .cmp(&row_b)
            .then_with(|| a.left.partial_cmp(&b.left).unwrap_or(Ordering::Equal))
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_models_are_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        match OnnxRecognizer::from_dir(dir.path()) {
            Err(OcrError::Unavailable(msg)) => assert!(msg.contains(DET_MODEL)),
            Err(other) => panic!("unexpected error {:?}", other),
            Ok(_) => panic!("loaded models from an empty directory"),
        }
    }

    #[test]
    fn test_reading_order() {
        let line = |top: f32, left: f32, text: &str| Line {
            top,
            left,
            text: text.to_string(),
        };
        let mut lines = vec![
            line(45.0, 10.0, "third"),
            line(5.0, 200.0, "second"),
            line(8.0, 10.0, "first"),
        ];
        sort_reading_order(&mut lines);
        let order: Vec<&str> = lines.iter().map(|l| l.text.as_str()).collect();
        assert_eq!(order, vec!["first", "second", "third"]);
    }
}
