//! Image normalization ahead of OCR.

use std::panic::{catch_unwind, AssertUnwindSafe};

use image::{DynamicImage, GrayImage, Luma};
use imageproc::contrast::otsu_level;
use imageproc::filter::median_filter;
use imageproc::geometry::min_area_rect;
use imageproc::point::Point;
use tracing::{debug, warn};

use super::NormalizedImage;
use crate::error::OcrError;
use crate::models::config::NormalizationConfig;

/// Fewer dark pixels than this and there is no text to measure skew from.
const MIN_FOREGROUND_PIXELS: usize = 32;

/// Image normalizer for the OCR path: grayscale, median denoise,
/// auto-contrast and deskew. Every stage is optional and best-effort.
#[derive(Debug, Clone)]
pub struct ImageNormalizer {
    config: NormalizationConfig,
}

impl ImageNormalizer {
    /// Create a normalizer with every stage enabled.
    pub fn new() -> Self {
        Self {
            config: NormalizationConfig::default(),
        }
    }

    /// Create a normalizer from configuration.
    pub fn from_config(config: &NormalizationConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    /// Disable every stage; images pass through untouched.
    pub fn passthrough() -> Self {
        Self {
            config: NormalizationConfig {
                grayscale: false,
                denoise: false,
                autocontrast: false,
                deskew: false,
                ..NormalizationConfig::default()
            },
        }
    }

    /// Run the enabled stages.
    ///
    /// Denoise, auto-contrast and deskew work on a single channel, so they
    /// only run when grayscale conversion is enabled.
    pub fn normalize(&self, image: &DynamicImage) -> NormalizedImage {
        let config = &self.config;

        if !config.grayscale {
            if config.denoise || config.autocontrast || config.deskew {
                debug!("Grayscale disabled, skipping single-channel stages");
            }
            return NormalizedImage::raw(image.clone(), config.dpi);
        }

        let mut stages = vec!["grayscale"];
        let mut gray = image.to_luma8();
        let mut skew_degrees = None;

        if config.denoise && config.median_radius > 0 {
            let radius = config.median_radius;
            gray = run_stage("denoise", gray, &mut stages, |img| {
                Ok(median_filter(img, radius, radius))
            });
        }

        if config.autocontrast {
            let cutoff = config.autocontrast_cutoff;
            gray = run_stage("autocontrast", gray, &mut stages, |img| {
                Ok(autocontrast(img, cutoff))
            });
        }

        if config.deskew {
            let min_skew = config.min_skew_degrees;
            let mut applied = None;
            gray = run_stage("deskew", gray, &mut stages, |img| {
                let angle = estimate_skew(img).ok_or_else(|| {
                    OcrError::Preprocessing("no foreground to measure skew".to_string())
                })?;
                if angle.abs() < min_skew {
                    debug!("Skew {:.2} deg below threshold, not rotating", angle);
                    return Ok(img.clone());
                }
                applied = Some(angle);
                Ok(rotate_bilinear(img, -angle))
            });
            skew_degrees = applied;
        }

        debug!(
            "Normalized {}x{} image with stages {:?}",
            gray.width(),
            gray.height(),
            stages
        );

        NormalizedImage {
            image: DynamicImage::ImageLuma8(gray),
            dpi: config.dpi,
            skew_degrees,
            stages,
        }
    }
}

impl Default for ImageNormalizer {
    fn default() -> Self {
        Self::new()
    }
}

/// Run one stage; on error or panic log it and keep the input.
fn run_stage<F>(
    name: &'static str,
    image: GrayImage,
    stages: &mut Vec<&'static str>,
    stage: F,
) -> GrayImage
where
    F: FnOnce(&GrayImage) -> Result<GrayImage, OcrError>,
{
    match catch_unwind(AssertUnwindSafe(|| stage(&image))) {
        Ok(Ok(output)) => {
            stages.push(name);
            output
        }
        Ok(Err(e)) => {
            warn!("Normalization stage {} skipped: {}", name, e);
            image
        }
        Err(_) => {
            warn!("Normalization stage {} panicked, skipped", name);
            image
        }
    }
}

/// Stretch intensities so the darkest level maps to 0 and the brightest to
/// 255, ignoring `cutoff` percent of pixels at each end of the histogram.
pub fn autocontrast(image: &GrayImage, cutoff: f32) -> GrayImage {
    let mut histogram = [0u64; 256];
    for pixel in image.pixels() {
        histogram[pixel.0[0] as usize] += 1;
    }

    let total: u64 = histogram.iter().sum();
    if total == 0 {
        return image.clone();
    }
    let clip = ((total as f64) * f64::from(cutoff.clamp(0.0, 49.0)) / 100.0) as u64;

    let mut low = 0usize;
    let mut seen = 0u64;
    for (level, count) in histogram.iter().enumerate() {
        seen += count;
        if seen > clip {
            low = level;
            break;
        }
    }

    let mut high = 255usize;
    seen = 0;
    for (level, count) in histogram.iter().enumerate().rev() {
        seen += count;
        if seen > clip {
            high = level;
            break;
        }
    }

    if high <= low {
        return image.clone();
    }

    let range = (high - low) as f32;
    let lut: Vec<u8> = (0..256usize)
        .map(|v| {
            if v <= low {
                0
            } else if v >= high {
                255
            } else {
                ((v - low) as f32 * 255.0 / range).round() as u8
            }
        })
        .collect();

    let mut output = image.clone();
    for pixel in output.pixels_mut() {
        pixel.0[0] = lut[pixel.0[0] as usize];
    }
    output
}

/// Reduce an angle in degrees modulo 90 into (-45, 45].
///
/// The edges of a rectangle are only defined up to quarter turns, so an
/// edge at -60 deg is the same skew as one at 30 deg.
pub fn normalize_skew_angle(angle: f32) -> f32 {
    if !angle.is_finite() {
        return 0.0;
    }
    let mut a = angle % 90.0;
    if a <= -45.0 {
        a += 90.0;
    } else if a > 45.0 {
        a -= 90.0;
    }
    a
}

/// Estimate the text skew in degrees (image coordinates, y down).
///
/// Binarizes with Otsu's threshold, takes the dark pixels as text, fits the
/// minimum-area rotated rectangle around them and reads the angle of its
/// edge. `None` when there is too little foreground.
pub fn estimate_skew(image: &GrayImage) -> Option<f32> {
    let threshold = otsu_level(image);

    let points: Vec<Point<i32>> = image
        .enumerate_pixels()
        .filter(|(_, _, p)| p.0[0] <= threshold)
        .map(|(x, y, _)| Point::new(x as i32, y as i32))
        .collect();

    let total = (image.width() as usize) * (image.height() as usize);
    if points.len() < MIN_FOREGROUND_PIXELS || points.len() == total {
        return None;
    }

    let corners = min_area_rect(&points);
    let edge = corners
        .iter()
        .zip(corners.iter().cycle().skip(1))
        .map(|(a, b)| (b.x - a.x, b.y - a.y))
        .find(|&(dx, dy)| dx != 0 || dy != 0)?;

    let raw = (edge.1 as f32).atan2(edge.0 as f32).to_degrees();
    let angle = normalize_skew_angle(raw);
    debug!("Skew estimate: edge {:.2} deg -> {:.2} deg", raw, angle);
    Some(angle)
}

/// Rotate about the image centre by `degrees` (image coordinates, y down)
/// with bilinear interpolation. Samples outside the source replicate the
/// nearest edge pixel.
pub fn rotate_bilinear(image: &GrayImage, degrees: f32) -> GrayImage {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return image.clone();
    }

    let (sin, cos) = degrees.to_radians().sin_cos();
    let cx = (width as f32 - 1.0) / 2.0;
    let cy = (height as f32 - 1.0) / 2.0;
    let max_x = (width - 1) as f32;
    let max_y = (height - 1) as f32;

    GrayImage::from_fn(width, height, |x, y| {
        let dx = x as f32 - cx;
        let dy = y as f32 - cy;
        // Inverse mapping: rotate the destination back into the source.
        let sx = (cx + cos * dx + sin * dy).clamp(0.0, max_x);
        let sy = (cy - sin * dx + cos * dy).clamp(0.0, max_y);

        let x0 = sx.floor() as u32;
        let y0 = sy.floor() as u32;
        let x1 = (x0 + 1).min(width - 1);
        let y1 = (y0 + 1).min(height - 1);
        let fx = sx - x0 as f32;
        let fy = sy - y0 as f32;

        let p = |px: u32, py: u32| image.get_pixel(px, py).0[0] as f32;
        let top = p(x0, y0) * (1.0 - fx) + p(x1, y0) * fx;
        let bottom = p(x0, y1) * (1.0 - fx) + p(x1, y1) * fx;
        Luma([(top * (1.0 - fy) + bottom * fy).round().clamp(0.0, 255.0) as u8])
    })
}
