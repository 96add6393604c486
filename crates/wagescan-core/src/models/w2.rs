//! W-2 wage statement data models.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::Path;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Every field of the normalized W-2 schema, in box order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum W2Field {
    EmployeeSsn,
    EmployerEin,
    EmployerName,
    EmployeeFirstName,
    EmployeeLastName,
    Wages,
    FederalWithholding,
    SocialSecurityWages,
    SocialSecurityTax,
    MedicareWages,
    MedicareTax,
    State,
    EmployerStateId,
    StateWages,
    StateWithholding,
}

impl W2Field {
    /// All schema fields in output order.
    pub const ALL: [W2Field; 15] = [
        W2Field::EmployeeSsn,
        W2Field::EmployerEin,
        W2Field::EmployerName,
        W2Field::EmployeeFirstName,
        W2Field::EmployeeLastName,
        W2Field::Wages,
        W2Field::FederalWithholding,
        W2Field::SocialSecurityWages,
        W2Field::SocialSecurityTax,
        W2Field::MedicareWages,
        W2Field::MedicareTax,
        W2Field::State,
        W2Field::EmployerStateId,
        W2Field::StateWages,
        W2Field::StateWithholding,
    ];

    /// Snake-case key used in serialized output.
    pub fn name(&self) -> &'static str {
        match self {
            W2Field::EmployeeSsn => "employee_ssn",
            W2Field::EmployerEin => "employer_ein",
            W2Field::EmployerName => "employer_name",
            W2Field::EmployeeFirstName => "employee_first_name",
            W2Field::EmployeeLastName => "employee_last_name",
            W2Field::Wages => "wages",
            W2Field::FederalWithholding => "federal_withholding",
            W2Field::SocialSecurityWages => "social_security_wages",
            W2Field::SocialSecurityTax => "social_security_tax",
            W2Field::MedicareWages => "medicare_wages",
            W2Field::MedicareTax => "medicare_tax",
            W2Field::State => "state",
            W2Field::EmployerStateId => "employer_state_id",
            W2Field::StateWages => "state_wages",
            W2Field::StateWithholding => "state_withholding",
        }
    }

    /// Whether the field holds a money amount (defaults to zero when absent).
    pub fn is_monetary(&self) -> bool {
        matches!(
            self,
            W2Field::Wages
                | W2Field::FederalWithholding
                | W2Field::SocialSecurityWages
                | W2Field::SocialSecurityTax
                | W2Field::MedicareWages
                | W2Field::MedicareTax
                | W2Field::StateWages
                | W2Field::StateWithholding
        )
    }
}

impl fmt::Display for W2Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A coerced field value, before it is placed into the record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Text(String),
    Amount(Decimal),
}

/// The normalized W-2 record.
///
/// Identifier fields are `None` when the document did not yield them.
/// Monetary fields are zero when absent; `missing_fields` tells an absent
/// amount apart from a reported zero.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractionResult {
    /// Employee social security number (box a), possibly redacted.
    pub employee_ssn: Option<String>,
    /// Employer identification number (box b).
    pub employer_ein: Option<String>,
    /// Employer name and address (box c).
    pub employer_name: Option<String>,
    /// Employee first name and initial (box e).
    pub employee_first_name: Option<String>,
    /// Employee last name (box e).
    pub employee_last_name: Option<String>,
    /// Box 1.
    pub wages: Decimal,
    /// Box 2.
    pub federal_withholding: Decimal,
    /// Box 3.
    pub social_security_wages: Decimal,
    /// Box 4.
    pub social_security_tax: Decimal,
    /// Box 5.
    pub medicare_wages: Decimal,
    /// Box 6.
    pub medicare_tax: Decimal,
    /// Box 15 state code.
    pub state: Option<String>,
    /// Box 15 employer state ID number.
    pub employer_state_id: Option<String>,
    /// Box 16.
    pub state_wages: Decimal,
    /// Box 17.
    pub state_withholding: Decimal,
    /// Schema fields no extraction strategy produced a value for.
    #[serde(default)]
    pub missing_fields: Vec<W2Field>,
}

impl ExtractionResult {
    /// Build a record from coerced values. Fields without a value keep their
    /// default and are listed in `missing_fields`.
    pub fn from_values<I>(values: I) -> Self
    where
        I: IntoIterator<Item = (W2Field, FieldValue)>,
    {
        let mut record = Self::default();
        let mut present = BTreeSet::new();

        for (field, value) in values {
            if record.set(field, value) {
                present.insert(field);
            }
        }

        record.missing_fields = W2Field::ALL
            .iter()
            .copied()
            .filter(|f| !present.contains(f))
            .collect();
        record
    }

    /// Whether the document yielded a value for the field.
    pub fn is_present(&self, field: W2Field) -> bool {
        !self.missing_fields.contains(&field)
    }

    /// Number of schema fields the document yielded.
    pub fn present_count(&self) -> usize {
        W2Field::ALL.len() - self.missing_fields.len()
    }

    /// Text value of an identifier field.
    pub fn get_text(&self, field: W2Field) -> Option<&str> {
        match field {
            W2Field::EmployeeSsn => self.employee_ssn.as_deref(),
            W2Field::EmployerEin => self.employer_ein.as_deref(),
            W2Field::EmployerName => self.employer_name.as_deref(),
            W2Field::EmployeeFirstName => self.employee_first_name.as_deref(),
            W2Field::EmployeeLastName => self.employee_last_name.as_deref(),
            W2Field::State => self.state.as_deref(),
            W2Field::EmployerStateId => self.employer_state_id.as_deref(),
            _ => None,
        }
    }

    /// Amount of a monetary field; `None` for identifier fields.
    pub fn get_amount(&self, field: W2Field) -> Option<Decimal> {
        match field {
            W2Field::Wages => Some(self.wages),
            W2Field::FederalWithholding => Some(self.federal_withholding),
            W2Field::SocialSecurityWages => Some(self.social_security_wages),
            W2Field::SocialSecurityTax => Some(self.social_security_tax),
            W2Field::MedicareWages => Some(self.medicare_wages),
            W2Field::MedicareTax => Some(self.medicare_tax),
            W2Field::StateWages => Some(self.state_wages),
            W2Field::StateWithholding => Some(self.state_withholding),
            _ => None,
        }
    }

    /// Returns true if the value was stored (the kind matched the field).
    fn set(&mut self, field: W2Field, value: FieldValue) -> bool {
        match value {
            FieldValue::Text(text) => match self.text_slot(field) {
                Some(slot) => {
                    *slot = Some(text);
                    true
                }
                None => false,
            },
            FieldValue::Amount(amount) => match self.amount_slot(field) {
                Some(slot) => {
                    *slot = amount;
                    true
                }
                None => false,
            },
        }
    }

    fn text_slot(&mut self, field: W2Field) -> Option<&mut Option<String>> {
        match field {
            W2Field::EmployeeSsn => Some(&mut self.employee_ssn),
            W2Field::EmployerEin => Some(&mut self.employer_ein),
            W2Field::EmployerName => Some(&mut self.employer_name),
            W2Field::EmployeeFirstName => Some(&mut self.employee_first_name),
            W2Field::EmployeeLastName => Some(&mut self.employee_last_name),
            W2Field::State => Some(&mut self.state),
            W2Field::EmployerStateId => Some(&mut self.employer_state_id),
            _ => None,
        }
    }

    fn amount_slot(&mut self, field: W2Field) -> Option<&mut Decimal> {
        match field {
            W2Field::Wages => Some(&mut self.wages),
            W2Field::FederalWithholding => Some(&mut self.federal_withholding),
            W2Field::SocialSecurityWages => Some(&mut self.social_security_wages),
            W2Field::SocialSecurityTax => Some(&mut self.social_security_tax),
            W2Field::MedicareWages => Some(&mut self.medicare_wages),
            W2Field::MedicareTax => Some(&mut self.medicare_tax),
            W2Field::StateWages => Some(&mut self.state_wages),
            W2Field::StateWithholding => Some(&mut self.state_withholding),
            _ => None,
        }
    }
}

/// Acquisition path that produced the text fed to the extraction engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentModality {
    /// Digital PDF with a usable text layer.
    PdfText,
    /// PDF container whose first page went through OCR.
    PdfScanned,
    /// Raw scan or photo.
    Image,
}

impl DocumentModality {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentModality::PdfText => "pdf_text",
            DocumentModality::PdfScanned => "pdf_scanned",
            DocumentModality::Image => "image",
        }
    }
}

/// Known label/value arrangements of W-2 text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayoutDialect {
    /// Colon-delimited labels with currency symbols.
    Clean,
    /// Run-together box captions followed by their values.
    Jumbled,
    /// Anything else; best-effort per field.
    Fallback,
}

impl LayoutDialect {
    pub fn as_str(&self) -> &'static str {
        match self {
            LayoutDialect::Clean => "clean",
            LayoutDialect::Jumbled => "jumbled",
            LayoutDialect::Fallback => "fallback",
        }
    }
}

impl fmt::Display for LayoutDialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Content kinds accepted for ingestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContentKind {
    #[serde(rename = "application/pdf")]
    Pdf,
    #[serde(rename = "image/png")]
    Png,
    #[serde(rename = "image/jpeg")]
    Jpeg,
}

impl ContentKind {
    /// Parse a declared MIME type.
    pub fn from_mime(mime: &str) -> Option<Self> {
        let essence = mime.split(';').next().unwrap_or("").trim().to_lowercase();
        match essence.as_str() {
            "application/pdf" => Some(ContentKind::Pdf),
            "image/png" => Some(ContentKind::Png),
            "image/jpeg" | "image/jpg" => Some(ContentKind::Jpeg),
            _ => None,
        }
    }

    /// Derive the kind from a file extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_lowercase();
        match ext.as_str() {
            "pdf" => Some(ContentKind::Pdf),
            "png" => Some(ContentKind::Png),
            "jpg" | "jpeg" => Some(ContentKind::Jpeg),
            _ => None,
        }
    }

    /// Sniff the kind from the leading bytes of a document.
    pub fn sniff(data: &[u8]) -> Option<Self> {
        if data.starts_with(b"%PDF") {
            return Some(ContentKind::Pdf);
        }
        match image::guess_format(data).ok()? {
            image::ImageFormat::Png => Some(ContentKind::Png),
            image::ImageFormat::Jpeg => Some(ContentKind::Jpeg),
            _ => None,
        }
    }

    pub fn mime(&self) -> &'static str {
        match self {
            ContentKind::Pdf => "application/pdf",
            ContentKind::Png => "image/png",
            ContentKind::Jpeg => "image/jpeg",
        }
    }

    pub fn is_image(&self) -> bool {
        !matches!(self, ContentKind::Pdf)
    }
}

/// Output of one ingestion: the record plus how it was obtained.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestionResult {
    /// Extracted field values.
    pub field_values: ExtractionResult,
    /// Acquisition path used.
    pub modality: DocumentModality,
    /// Layout dialect the text was classified as.
    pub dialect: LayoutDialect,
    /// Confidence of the strategy that produced each present field.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub field_confidence: BTreeMap<W2Field, f32>,
    /// Whitespace-normalized text the fields were extracted from.
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub raw_text: String,
    /// Extraction warnings (missing fields, suspicious values).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
    /// Processing time in milliseconds.
    pub processing_time_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_from_values_tracks_missing() {
        let record = ExtractionResult::from_values(vec![
            (W2Field::EmployeeSsn, FieldValue::Text("123-45-6789".into())),
            (W2Field::Wages, FieldValue::Amount(Decimal::new(5000000, 2))),
            (W2Field::MedicareTax, FieldValue::Amount(Decimal::ZERO)),
        ]);

        assert_eq!(record.employee_ssn.as_deref(), Some("123-45-6789"));
        assert_eq!(record.wages, Decimal::new(5000000, 2));
        assert!(record.is_present(W2Field::MedicareTax));
        assert!(!record.is_present(W2Field::SocialSecurityTax));
        assert_eq!(record.social_security_tax, Decimal::ZERO);
        assert_eq!(record.present_count(), 3);
        assert_eq!(record.missing_fields.len(), 12);
    }

    #[test]
    fn test_mismatched_value_kind_is_ignored() {
        let record = ExtractionResult::from_values(vec![(
            W2Field::Wages,
            FieldValue::Text("fifty".into()),
        )]);
        assert!(!record.is_present(W2Field::Wages));
        assert_eq!(record.wages, Decimal::ZERO);
    }

    #[test]
    fn test_serialized_record_has_every_field() {
        let json = serde_json::to_value(ExtractionResult::from_values(Vec::new())).unwrap();
        for field in W2Field::ALL {
            assert!(json.get(field.name()).is_some(), "missing key {}", field);
        }
        assert!(json["employee_ssn"].is_null());
    }

    #[test]
    fn test_content_kind_parsing() {
        assert_eq!(ContentKind::from_mime("application/pdf"), Some(ContentKind::Pdf));
        assert_eq!(ContentKind::from_mime("IMAGE/JPEG; q=1"), Some(ContentKind::Jpeg));
        assert_eq!(ContentKind::from_mime("text/plain"), None);
        assert_eq!(ContentKind::from_path(Path::new("w2.PNG")), Some(ContentKind::Png));
        assert_eq!(ContentKind::sniff(b"%PDF-1.7\n"), Some(ContentKind::Pdf));
        assert_eq!(
            ContentKind::sniff(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]),
            Some(ContentKind::Png)
        );
        assert_eq!(ContentKind::sniff(b"hello"), None);
    }

    #[test]
    fn test_modality_serialization() {
        assert_eq!(
            serde_json::to_string(&DocumentModality::PdfScanned).unwrap(),
            "\"pdf_scanned\""
        );
        assert_eq!(serde_json::to_string(&LayoutDialect::Jumbled).unwrap(), "\"jumbled\"");
    }
}
