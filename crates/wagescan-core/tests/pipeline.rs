//! End-to-end ingestion tests with an in-memory recognizer.

use std::io::Cursor;

use image::{DynamicImage, ImageFormat};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};
use pretty_assertions::assert_eq;
use rust_decimal::Decimal;

use wagescan_core::{
    ContentKind, DocumentModality, ImageNormalizer, LayoutDialect, NormalizedImage, OcrError,
    TextRecognizer, W2Error, W2Field, W2Pipeline,
};

const JUMBLED_OCR: &str = "a Employee's social security number 123-45-6789 \
    b Employer identitication number (EIN) 1 Wages, tips, other compensation \
    2 Federal income tax withheld 12-3456789 50000.00 5000.00";

struct FixedRecognizer(&'static str);

impl TextRecognizer for FixedRecognizer {
    fn name(&self) -> &str {
        "fixed"
    }

    fn recognize(&self, image: &NormalizedImage) -> Result<String, OcrError> {
        assert_eq!(image.stages.first(), Some(&"grayscale"));
        Ok(self.0.to_string())
    }
}

fn encode(format: ImageFormat) -> Vec<u8> {
    let mut buf = Cursor::new(Vec::new());
    DynamicImage::new_luma8(48, 48)
        .write_to(&mut buf, format)
        .unwrap();
    buf.into_inner()
}

/// A one-page PDF whose only content is a gray full-page image.
fn scanned_pdf() -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let image_id = doc.add_object(Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => 48,
            "Height" => 48,
            "ColorSpace" => "DeviceGray",
            "BitsPerComponent" => 8,
        },
        vec![200u8; 48 * 48],
    ));
    let resources_id = doc.add_object(dictionary! {
        "XObject" => dictionary! { "Im1" => image_id },
    });

    let content = Content {
        operations: vec![
            Operation::new("q", vec![]),
            Operation::new(
                "cm",
                vec![612.into(), 0.into(), 0.into(), 792.into(), 0.into(), 0.into()],
            ),
            Operation::new("Do", vec!["Im1".into()]),
            Operation::new("Q", vec![]),
        ],
    };
    let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "Contents" => content_id,
    });
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![page_id.into()],
            "Count" => 1,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut buf = Vec::new();
    doc.save_to(&mut buf).unwrap();
    buf
}

fn pipeline(ocr_text: &'static str) -> W2Pipeline {
    W2Pipeline::builder()
        .with_recognizer(FixedRecognizer(ocr_text))
        .with_normalizer(ImageNormalizer::new())
        .build()
}

#[test]
fn test_scanned_image_extracts_jumbled_fields() {
    let result = pipeline(JUMBLED_OCR)
        .ingest_bytes(&encode(ImageFormat::Png), ContentKind::Png)
        .unwrap();

    assert_eq!(result.modality, DocumentModality::Image);
    assert_eq!(result.dialect, LayoutDialect::Jumbled);
    assert_eq!(result.field_values.employee_ssn.as_deref(), Some("123-45-6789"));
    assert_eq!(result.field_values.employer_ein.as_deref(), Some("12-3456789"));
    assert_eq!(result.field_values.wages, Decimal::new(5000000, 2));
    assert_eq!(result.field_values.federal_withholding, Decimal::new(500000, 2));
}

#[test]
fn test_scanned_pdf_goes_through_ocr() {
    let result = pipeline(JUMBLED_OCR)
        .ingest_bytes(&scanned_pdf(), ContentKind::Pdf)
        .unwrap();

    assert_eq!(result.modality, DocumentModality::PdfScanned);
    assert_eq!(result.field_values.wages, Decimal::new(5000000, 2));
}

#[test]
fn test_empty_text_fails_for_every_content_kind() {
    let pipeline = pipeline("  \n\t ");
    let inputs = [
        (scanned_pdf(), ContentKind::Pdf),
        (encode(ImageFormat::Png), ContentKind::Png),
        (encode(ImageFormat::Jpeg), ContentKind::Jpeg),
    ];

    for (data, kind) in inputs {
        let err = pipeline.ingest_bytes(&data, kind).unwrap_err();
        assert!(
            matches!(err, W2Error::Extraction(_)),
            "{:?} gave {:?}",
            kind,
            err
        );
        assert_eq!(err.kind(), "document_parse_error");
    }
}

#[test]
fn test_unrecognized_text_degrades_to_defaults() {
    let result = pipeline("Quarterly newsletter, nothing to see here")
        .ingest_bytes(&encode(ImageFormat::Png), ContentKind::Png)
        .unwrap();

    assert_eq!(result.dialect, LayoutDialect::Fallback);
    assert_eq!(result.field_values.employee_ssn, None);
    assert_eq!(result.field_values.wages, Decimal::ZERO);
    assert_eq!(result.field_values.missing_fields, W2Field::ALL.to_vec());
    assert_eq!(result.warnings.len(), W2Field::ALL.len());
}

#[test]
fn test_image_without_recognizer_is_unavailable() {
    let pipeline = W2Pipeline::builder().build();
    let err = pipeline
        .ingest_bytes(&encode(ImageFormat::Png), ContentKind::Png)
        .unwrap_err();

    assert!(matches!(err, W2Error::Ocr(OcrError::Unavailable(_))));
}

#[test]
fn test_ingest_path_rejects_unsupported_media_type() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("w2.png");
    std::fs::write(&path, encode(ImageFormat::Png)).unwrap();

    let pipeline = pipeline(JUMBLED_OCR);
    let err = pipeline.ingest_path(&path, Some("text/plain")).unwrap_err();
    assert_eq!(err.kind(), "unsupported_media_type");

    let result = pipeline.ingest_path(&path, None).unwrap();
    assert_eq!(result.modality, DocumentModality::Image);

    let text_path = dir.path().join("notes.txt");
    std::fs::write(&text_path, "just words").unwrap();
    assert!(matches!(
        pipeline.ingest_path(&text_path, None),
        Err(W2Error::UnsupportedMediaType(_))
    ));
}

#[test]
fn test_serialized_output_shape() {
    let result = pipeline(JUMBLED_OCR)
        .ingest_bytes(&encode(ImageFormat::Png), ContentKind::Png)
        .unwrap();

    let json = serde_json::to_value(&result).unwrap();
    assert_eq!(json["modality"], "image");
    assert_eq!(json["dialect"], "jumbled");
    assert_eq!(json["field_values"]["employer_ein"], "12-3456789");
    assert!(json["field_values"]["state"].is_null());
}
