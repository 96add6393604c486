//! PDF text and image extraction using lopdf and pdf-extract.

use std::panic::{catch_unwind, AssertUnwindSafe};

use image::{DynamicImage, GrayImage, RgbImage};
use lopdf::{Dictionary, Document, Object, ObjectId};
use tracing::{debug, trace};

use super::{PdfProcessor, Result};
use crate::error::PdfError;

/// PDF content extractor using lopdf.
pub struct PdfExtractor {
    document: Option<Document>,
    raw_data: Vec<u8>,
}

impl PdfExtractor {
    /// Create a new PDF extractor.
    pub fn new() -> Self {
        Self {
            document: None,
            raw_data: Vec::new(),
        }
    }

    /// Load a PDF from bytes. Encrypted documents are retried with the
    /// empty password.
    pub fn load(&mut self, data: &[u8]) -> Result<()> {
        let mut doc = Document::load_mem(data).map_err(|e| PdfError::Parse(e.to_string()))?;

        if doc.is_encrypted() {
            if doc.decrypt("").is_err() {
                return Err(PdfError::Encrypted);
            }
            debug!("Decrypted PDF with empty password");

            // pdf-extract re-parses the bytes, so hand it the decrypted copy
            let mut decrypted_data = Vec::new();
            doc.save_to(&mut decrypted_data)
                .map_err(|e| PdfError::Parse(format!("Failed to save decrypted PDF: {}", e)))?;
            self.raw_data = decrypted_data;
        } else {
            self.raw_data = data.to_vec();
        }

        let page_count = doc.get_pages().len();
        if page_count == 0 {
            return Err(PdfError::NoPages);
        }

        debug!("Loaded PDF with {} pages", page_count);
        self.document = Some(doc);
        Ok(())
    }

    fn document(&self) -> Result<&Document> {
        self.document
            .as_ref()
            .ok_or_else(|| PdfError::Parse("No document loaded".to_string()))
    }

    fn page_texts(&self) -> Result<Vec<String>> {
        self.document()?;
        // pdf-extract panics on some malformed content streams
        let data = &self.raw_data;
        catch_unwind(AssertUnwindSafe(|| pdf_extract::extract_text_from_mem_by_pages(data)))
            .map_err(|_| PdfError::TextExtraction("text extraction panicked".to_string()))?
            .map_err(|e| PdfError::TextExtraction(e.to_string()))
    }

    /// Extract all images from the entire document.
    fn extract_all_images(&self, doc: &Document) -> Vec<DynamicImage> {
        let images: Vec<DynamicImage> = doc
            .objects
            .values()
            .filter_map(|object| self.try_extract_image_from_object(doc, object))
            .collect();

        debug!("Found {} images in document", images.len());
        images
    }

    fn try_extract_image_from_object(&self, doc: &Document, obj: &Object) -> Option<DynamicImage> {
        let Object::Stream(stream) = obj else {
            return None;
        };
        let dict = &stream.dict;

        if dict.get(b"Subtype").ok()?.as_name().ok()? != b"Image" {
            return None;
        }

        let width = dict.get(b"Width").ok()?.as_i64().ok()? as u32;
        let height = dict.get(b"Height").ok()?.as_i64().ok()? as u32;
        trace!("Found image object: {}x{}", width, height);

        if let Ok(filter) = dict.get(b"Filter") {
            let filter_name = match filter {
                Object::Name(name) => Some(name.as_slice()),
                Object::Array(arr) => arr.last().and_then(|o| o.as_name().ok()),
                _ => None,
            };

            match filter_name {
                Some(b"DCTDecode") => {
                    // Scanned pages are usually JPEG; the stream is the file
                    return image::load_from_memory_with_format(
                        &stream.content,
                        image::ImageFormat::Jpeg,
                    )
                    .ok();
                }
                Some(b"JPXDecode") | Some(b"CCITTFaxDecode") | Some(b"JBIG2Decode") => {
                    trace!("Unsupported image filter {:?}", filter_name.map(String::from_utf8_lossy));
                    return None;
                }
                _ => {}
            }
        }

        let data = stream
            .decompressed_content()
            .unwrap_or_else(|_| stream.content.clone());

        let color_space = dict
            .get(b"ColorSpace")
            .ok()
            .and_then(|o| match o {
                Object::Name(name) => Some(name.as_slice()),
                Object::Array(arr) => arr.first().and_then(|o| o.as_name().ok()),
                Object::Reference(r) => doc.get_object(*r).ok().and_then(|o| o.as_name().ok()),
                _ => None,
            })
            .unwrap_or(b"DeviceRGB");

        let bits = dict
            .get(b"BitsPerComponent")
            .ok()
            .and_then(|o| o.as_i64().ok())
            .unwrap_or(8) as u8;

        decode_raw_image(&data, width, height, color_space, bits)
    }

    /// Embedded images placed on a page (1-indexed).
    pub fn extract_images(&self, page: u32) -> Result<Vec<DynamicImage>> {
        let doc = self.document()?;

        let pages = doc.get_pages();
        let page_id = pages.get(&page).ok_or(PdfError::InvalidPage(page))?;

        let mut images = Vec::new();

        if let Some(resources) = self.resources(doc, *page_id) {
            if let Ok(xobjects) = resources.get(b"XObject") {
                if let Ok((_, Object::Dictionary(xobj_dict))) = doc.dereference(xobjects) {
                    for (_name, obj_ref) in xobj_dict.iter() {
                        if let Ok((_, obj)) = doc.dereference(obj_ref) {
                            if let Some(img) = self.try_extract_image_from_object(doc, obj) {
                                images.push(img);
                            }
                        }
                    }
                }
            }
        }

        // Some producers hang images off the document rather than the page
        // resources; for single-page documents take them all.
        if images.is_empty() && pages.len() == 1 {
            debug!("No XObject images found on page {}, scanning all objects", page);
            images = self.extract_all_images(doc);
        }

        debug!("Extracted {} images from page {}", images.len(), page);
        Ok(images)
    }

    /// Get the resources dictionary for a page node, walking up the page
    /// tree for inherited resources.
    fn resources(&self, doc: &Document, node_id: ObjectId) -> Option<Dictionary> {
        let Object::Dictionary(dict) = doc.get_object(node_id).ok()? else {
            return None;
        };

        if let Ok(resources) = dict.get(b"Resources") {
            if let Ok((_, Object::Dictionary(res_dict))) = doc.dereference(resources) {
                return Some(res_dict.clone());
            }
        }

        match dict.get(b"Parent") {
            Ok(Object::Reference(parent_id)) => self.resources(doc, *parent_id),
            _ => None,
        }
    }
}

impl Default for PdfExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl PdfProcessor for PdfExtractor {
    fn page_count(&self) -> u32 {
        self.document
            .as_ref()
            .map(|doc| doc.get_pages().len() as u32)
            .unwrap_or(0)
    }

    fn extract_text(&self) -> Result<String> {
        Ok(self.page_texts()?.join("\n"))
    }

    /// A scanned page is a single full-page image, so the raster is the
    /// largest image placed on the page at its native resolution.
    fn render_page(&self, page: u32, dpi: u32) -> Result<DynamicImage> {
        let images = self.extract_images(page)?;

        let largest = images
            .into_iter()
            .max_by_key(|img| u64::from(img.width()) * u64::from(img.height()));

        match largest {
            Some(img) => {
                debug!(
                    "Rendered page {} from embedded {}x{} image (requested {} dpi)",
                    page,
                    img.width(),
                    img.height(),
                    dpi
                );
                Ok(img)
            }
            None => Err(PdfError::ImageExtraction(format!(
                "No images found on page {}",
                page
            ))),
        }
    }
}

/// Decode an uncompressed (or Flate-decompressed) image stream.
fn decode_raw_image(
    data: &[u8],
    width: u32,
    height: u32,
    color_space: &[u8],
    bits_per_component: u8,
) -> Option<DynamicImage> {
    let pixels = (width as usize) * (height as usize);

    match (color_space, bits_per_component) {
        (b"DeviceRGB" | b"RGB", 8) if data.len() >= pixels * 3 => {
            RgbImage::from_raw(width, height, data[..pixels * 3].to_vec()).map(DynamicImage::ImageRgb8)
        }
        (b"DeviceGray" | b"G", 8) if data.len() >= pixels => {
            GrayImage::from_raw(width, height, data[..pixels].to_vec()).map(DynamicImage::ImageLuma8)
        }
        (b"DeviceGray" | b"G", 1) => {
            // Rows are padded to whole bytes; a set bit is white.
            let row_bytes = (width as usize).div_ceil(8);
            if data.len() < row_bytes * height as usize {
                return None;
            }
            let mut gray = GrayImage::new(width, height);
            for (x, y, pixel) in gray.enumerate_pixels_mut() {
                let byte = data[y as usize * row_bytes + x as usize / 8];
                let bit = (byte >> (7 - (x % 8))) & 1;
                pixel.0[0] = if bit == 1 { 255 } else { 0 };
            }
            Some(DynamicImage::ImageLuma8(gray))
        }
        (b"DeviceCMYK" | b"CMYK", 8) if data.len() >= pixels * 4 => {
            let rgb: Vec<u8> = data[..pixels * 4]
                .chunks_exact(4)
                .flat_map(|c| {
                    let k = 255 - u16::from(c[3]);
                    [c[0], c[1], c[2]].map(|v| ((255 - u16::from(v)) * k / 255) as u8)
                })
                .collect();
            RgbImage::from_raw(width, height, rgb).map(DynamicImage::ImageRgb8)
        }
        _ => {
            trace!(
                "Could not decode image: {}x{}, colorspace={}, bits={}, data_len={}",
                width,
                height,
                String::from_utf8_lossy(color_space),
                bits_per_component,
                data.len()
            );
            None
        }
    }
}
