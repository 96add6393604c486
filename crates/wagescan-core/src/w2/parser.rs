//! Dialect-dispatch W-2 parser.

use std::collections::BTreeMap;
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::error::ExtractionError;
use crate::models::config::ExtractionConfig;
use crate::models::w2::{ExtractionResult, LayoutDialect, W2Field};

use super::classify::{classify, normalize_whitespace};
use super::rules::{validate_ein, validate_ssn, DialectTable};
use super::Result;

/// Result of parsing one document's text.
#[derive(Debug, Clone)]
pub struct ParseOutcome {
    /// Extracted record.
    pub fields: ExtractionResult,
    /// Dialect the text was classified as.
    pub dialect: LayoutDialect,
    /// Whitespace-normalized text the rules ran against.
    pub text: String,
    /// Confidence of the strategy that produced each present field.
    pub field_confidence: BTreeMap<W2Field, f32>,
    /// Missing fields and suspicious values.
    pub warnings: Vec<String>,
    /// Processing time in milliseconds.
    pub processing_time_ms: u64,
}

/// Trait for W-2 text parsers.
pub trait W2Parser: Send + Sync {
    /// Parse a W-2 record from raw text.
    fn parse(&self, text: &str) -> Result<ParseOutcome>;
}

/// Classifies text once, then runs the matching dialect table.
#[derive(Debug, Clone)]
pub struct DialectParser {
    /// Whether to warn about SSNs and EINs that cannot have been issued.
    validate_identifiers: bool,
    /// Whether to warn about amounts that contradict each other.
    sanity_checks: bool,
}

impl DialectParser {
    /// Create a new parser with default settings.
    pub fn new() -> Self {
        Self {
            validate_identifiers: true,
            sanity_checks: true,
        }
    }

    /// Create a parser from the extraction section of the configuration.
    pub fn from_config(config: &ExtractionConfig) -> Self {
        Self::new()
            .with_identifier_validation(config.validate_identifiers)
            .with_sanity_checks(config.sanity_checks)
    }

    /// Set SSN/EIN validation.
    pub fn with_identifier_validation(mut self, validate: bool) -> Self {
        self.validate_identifiers = validate;
        self
    }

    /// Set cross-field sanity checks.
    pub fn with_sanity_checks(mut self, enabled: bool) -> Self {
        self.sanity_checks = enabled;
        self
    }

    fn identifier_warnings(&self, fields: &ExtractionResult, warnings: &mut Vec<String>) {
        if let Some(ssn) = &fields.employee_ssn {
            if !validate_ssn(ssn) {
                warnings.push(format!("Employee SSN {} is not a valid SSN", ssn));
            }
        }
        if let Some(ein) = &fields.employer_ein {
            if !validate_ein(ein) {
                warnings.push(format!("Employer EIN {} is not a valid EIN", ein));
            }
        }
    }

    fn sanity_warnings(&self, fields: &ExtractionResult, warnings: &mut Vec<String>) {
        let pairs = [
            (W2Field::FederalWithholding, W2Field::Wages),
            (W2Field::SocialSecurityTax, W2Field::SocialSecurityWages),
            (W2Field::MedicareTax, W2Field::MedicareWages),
        ];

        for (tax, base) in pairs {
            if !fields.is_present(tax) || !fields.is_present(base) {
                continue;
            }
            if let (Some(tax_amount), Some(base_amount)) =
                (fields.get_amount(tax), fields.get_amount(base))
            {
                if tax_amount > base_amount {
                    warnings.push(format!(
                        "{} ({}) exceeds {} ({})",
                        tax, tax_amount, base, base_amount
                    ));
                }
            }
        }
    }
}

impl Default for DialectParser {
    fn default() -> Self {
        Self::new()
    }
}

impl W2Parser for DialectParser {
    fn parse(&self, text: &str) -> Result<ParseOutcome> {
        let start = Instant::now();
        let normalized = normalize_whitespace(text);

        if normalized.is_empty() {
            return Err(ExtractionError::empty("empty text extracted from document"));
        }

        let dialect = classify(&normalized);
        info!(
            "Parsing W-2 from {} characters of text as {} layout",
            normalized.len(),
            dialect
        );

        let matches = DialectTable::for_dialect(dialect).apply(&normalized);
        let field_confidence: BTreeMap<W2Field, f32> = matches
            .iter()
            .map(|(field, m)| (*field, m.confidence))
            .collect();
        let fields =
            ExtractionResult::from_values(matches.into_iter().map(|(field, m)| (field, m.value)));

        let mut warnings: Vec<String> = fields
            .missing_fields
            .iter()
            .map(|field| format!("Could not extract {}", field))
            .collect();

        if self.validate_identifiers {
            self.identifier_warnings(&fields, &mut warnings);
        }
        if self.sanity_checks {
            self.sanity_warnings(&fields, &mut warnings);
        }

        if fields.present_count() == 0 {
            warn!("No W-2 fields recognized in {} layout text", dialect);
        }
        debug!(
            "Extracted {}/{} fields with {} warnings",
            fields.present_count(),
            W2Field::ALL.len(),
            warnings.len()
        );

        Ok(ParseOutcome {
            fields,
            dialect,
            text: normalized,
            field_confidence,
            warnings,
            processing_time_ms: start.elapsed().as_millis() as u64,
        })
    }
}
