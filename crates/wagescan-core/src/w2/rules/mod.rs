//! Rule tables for W-2 field extraction.
//!
//! Each layout dialect is a [`DialectTable`]: an ordered list of rules.
//! Block rules fill several fields from one match; field rules try their
//! strategies in order and keep the first value that coerces. A field
//! filled by an earlier rule is never overwritten.

pub mod amounts;
pub mod identifiers;
pub mod patterns;

use std::collections::BTreeMap;

use lazy_static::lazy_static;
use regex::Regex;
use tracing::trace;

use crate::models::w2::{FieldValue, LayoutDialect, W2Field};

use super::normalize::{coerce, split_name};
use patterns::*;

pub use amounts::{format_amount, parse_amount};
pub use identifiers::{is_state_code, normalize_ein, normalize_ssn, validate_ein, validate_ssn};

/// Confidence for values captured right after their own label.
const LABELED: f32 = 0.95;
/// Confidence for values assigned by position within a caption run.
const POSITIONAL: f32 = 0.85;
/// Confidence for loose keyword-window and bare-shape matches.
const LOOSE: f32 = 0.6;

/// A coerced value and the confidence of the strategy that produced it.
#[derive(Debug, Clone)]
pub struct ExtractionMatch<T> {
    /// Extracted value.
    pub value: T,
    /// Confidence score (0.0 - 1.0).
    pub confidence: f32,
}

impl<T> ExtractionMatch<T> {
    pub fn new(value: T, confidence: f32) -> Self {
        Self { value, confidence }
    }
}

/// One pattern to try for a field. Group 1 is the raw value.
#[derive(Debug, Clone, Copy)]
pub struct Strategy {
    pub pattern: &'static Regex,
    pub confidence: f32,
}

/// How the groups of a block match map onto fields.
#[derive(Debug, Clone, Copy)]
pub enum BlockLayout {
    /// Group N+1 feeds the Nth field.
    Positional(&'static [W2Field]),
    /// Group 1 is a "first rest..." name span, split at the first word.
    NameSplit,
}

/// A single step of a dialect table.
#[derive(Debug, Clone)]
pub enum Rule {
    Block {
        pattern: &'static Regex,
        layout: BlockLayout,
        confidence: f32,
    },
    Field {
        field: W2Field,
        strategies: Vec<Strategy>,
    },
}

impl Rule {
    fn block(pattern: &'static Regex, fields: &'static [W2Field]) -> Self {
        Rule::Block {
            pattern,
            layout: BlockLayout::Positional(fields),
            confidence: POSITIONAL,
        }
    }

    fn labeled_block(pattern: &'static Regex, fields: &'static [W2Field]) -> Self {
        Rule::Block {
            pattern,
            layout: BlockLayout::Positional(fields),
            confidence: LABELED,
        }
    }

    fn name_split(pattern: &'static Regex) -> Self {
        Rule::Block {
            pattern,
            layout: BlockLayout::NameSplit,
            confidence: POSITIONAL,
        }
    }

    fn field(field: W2Field, strategies: &[(&'static Regex, f32)]) -> Self {
        Rule::Field {
            field,
            strategies: strategies
                .iter()
                .map(|&(pattern, confidence)| Strategy { pattern, confidence })
                .collect(),
        }
    }
}

/// Ordered extraction rules for one layout dialect.
#[derive(Debug, Clone)]
pub struct DialectTable {
    pub dialect: LayoutDialect,
    pub rules: Vec<Rule>,
}

/// Values found by a table run, keyed by field.
pub type FieldMatches = BTreeMap<W2Field, ExtractionMatch<FieldValue>>;

impl DialectTable {
    /// The table for a dialect.
    pub fn for_dialect(dialect: LayoutDialect) -> &'static DialectTable {
        match dialect {
            LayoutDialect::Clean => &CLEAN_TABLE,
            LayoutDialect::Jumbled => &JUMBLED_TABLE,
            LayoutDialect::Fallback => &FALLBACK_TABLE,
        }
    }

    /// Run every rule against `text` in order.
    pub fn apply(&self, text: &str) -> FieldMatches {
        let mut found = FieldMatches::new();

        for rule in &self.rules {
            match rule {
                Rule::Block {
                    pattern,
                    layout,
                    confidence,
                } => apply_block(text, pattern, *layout, *confidence, &mut found),
                Rule::Field { field, strategies } => {
                    if found.contains_key(field) {
                        continue;
                    }
                    if let Some(m) = apply_strategies(text, *field, strategies) {
                        found.insert(*field, m);
                    }
                }
            }
        }

        found
    }
}

fn apply_strategies(
    text: &str,
    field: W2Field,
    strategies: &[Strategy],
) -> Option<ExtractionMatch<FieldValue>> {
    for strategy in strategies {
        for caps in strategy.pattern.captures_iter(text) {
            let Some(raw) = caps.get(1) else { continue };
            if let Some(value) = coerce(field, raw.as_str()) {
                trace!("{} matched by /{}/", field, strategy.pattern.as_str());
                return Some(ExtractionMatch::new(value, strategy.confidence));
            }
        }
    }
    None
}

fn apply_block(
    text: &str,
    pattern: &Regex,
    layout: BlockLayout,
    confidence: f32,
    found: &mut FieldMatches,
) {
    for caps in pattern.captures_iter(text) {
        let mut filled = false;

        match layout {
            BlockLayout::Positional(fields) => {
                for (i, field) in fields.iter().enumerate() {
                    if found.contains_key(field) {
                        continue;
                    }
                    let Some(raw) = caps.get(i + 1) else { continue };
                    if let Some(value) = coerce(*field, raw.as_str()) {
                        found.insert(*field, ExtractionMatch::new(value, confidence));
                        filled = true;
                    }
                }
            }
            BlockLayout::NameSplit => {
                let Some(raw) = caps.get(1) else { continue };
                if let Some((first, last)) = split_name(raw.as_str()) {
                    let pairs = [
                        (W2Field::EmployeeFirstName, Some(first)),
                        (W2Field::EmployeeLastName, last),
                    ];
                    for (field, value) in pairs {
                        let Some(value) = value else { continue };
                        if found.contains_key(&field) {
                            continue;
                        }
                        found.insert(field, ExtractionMatch::new(FieldValue::Text(value), confidence));
                        filled = true;
                    }
                }
            }
        }

        if filled {
            trace!("block /{}/ matched", pattern.as_str());
            break;
        }
    }
}

const EIN_WAGES_FEDERAL: &[W2Field] = &[
    W2Field::EmployerEin,
    W2Field::Wages,
    W2Field::FederalWithholding,
];
const SOCIAL_SECURITY: &[W2Field] = &[W2Field::SocialSecurityWages, W2Field::SocialSecurityTax];
const MEDICARE: &[W2Field] = &[W2Field::MedicareWages, W2Field::MedicareTax];
const EMPLOYEE_NAME: &[W2Field] = &[W2Field::EmployeeFirstName, W2Field::EmployeeLastName];
const STATE_AND_ID: &[W2Field] = &[W2Field::State, W2Field::EmployerStateId];
const STATE_AMOUNTS: &[W2Field] = &[W2Field::StateWages, W2Field::StateWithholding];

fn clean_rules() -> Vec<Rule> {
    vec![
        Rule::field(
            W2Field::EmployeeSsn,
            &[(&*SSN_LABELED, LABELED), (&*SSN_SHORT_LABEL, LABELED)],
        ),
        Rule::field(
            W2Field::EmployerEin,
            &[(&*EIN_LABELED, LABELED), (&*EIN_SHORT_LABEL, LABELED)],
        ),
        Rule::field(
            W2Field::EmployerName,
            &[(&*EMPLOYER_NAME_ADDRESS, LABELED), (&*EMPLOYER_NAME, LABELED)],
        ),
        Rule::labeled_block(&EMPLOYEE_NAME_LABELS, EMPLOYEE_NAME),
        Rule::name_split(&EMPLOYEE_NAME_ADDRESS),
        Rule::field(W2Field::Wages, &[(&*WAGES, LABELED)]),
        Rule::field(W2Field::FederalWithholding, &[(&*FEDERAL_WITHHOLDING, LABELED)]),
        Rule::field(W2Field::SocialSecurityWages, &[(&*SOCIAL_SECURITY_WAGES, LABELED)]),
        Rule::field(W2Field::SocialSecurityTax, &[(&*SOCIAL_SECURITY_TAX, LABELED)]),
        Rule::field(W2Field::MedicareWages, &[(&*MEDICARE_WAGES, LABELED)]),
        Rule::field(W2Field::MedicareTax, &[(&*MEDICARE_TAX, LABELED)]),
        Rule::field(W2Field::State, &[(&*STATE_BOX, LABELED), (&*STATE_LABELED, LABELED)]),
        Rule::field(W2Field::EmployerStateId, &[(&*STATE_ID, LABELED)]),
        Rule::field(W2Field::StateWages, &[(&*STATE_WAGES, LABELED)]),
        Rule::field(W2Field::StateWithholding, &[(&*STATE_WITHHOLDING, LABELED)]),
    ]
}

fn jumbled_rules() -> Vec<Rule> {
    vec![
        Rule::block(&JUMBLED_EIN_WAGES_FEDERAL, EIN_WAGES_FEDERAL),
        Rule::block(&JUMBLED_SOCIAL_SECURITY, SOCIAL_SECURITY),
        Rule::block(&JUMBLED_MEDICARE, MEDICARE),
        Rule::labeled_block(&EMPLOYEE_NAME_LABELS, EMPLOYEE_NAME),
        Rule::block(&EMPLOYEE_NAME_LABELS_RUN, EMPLOYEE_NAME),
        Rule::block(&JUMBLED_STATE_ID, STATE_AND_ID),
        Rule::block(&JUMBLED_STATE_ID_RUN, STATE_AND_ID),
        Rule::block(&JUMBLED_STATE_WAGES_RUN, STATE_AMOUNTS),
        Rule::block(&JUMBLED_STATE_WAGES, STATE_AMOUNTS),
        Rule::field(W2Field::EmployeeSsn, &[(&*SSN_LABELED, LABELED)]),
        Rule::field(W2Field::EmployerName, &[(&*EMPLOYER_NAME_ADDRESS, LABELED)]),
    ]
}

/// Every labeled rule, then the jumbled blocks, then loose keyword windows
/// and bare identifier shapes.
fn fallback_rules() -> Vec<Rule> {
    vec![
        Rule::field(
            W2Field::EmployeeSsn,
            &[
                (&*SSN_LABELED, LABELED),
                (&*SSN_SHORT_LABEL, LABELED),
                (&*SSN_STANDALONE, LOOSE),
            ],
        ),
        Rule::block(&JUMBLED_EIN_WAGES_FEDERAL, EIN_WAGES_FEDERAL),
        Rule::field(
            W2Field::EmployerEin,
            &[
                (&*EIN_LABELED, LABELED),
                (&*EIN_SHORT_LABEL, LABELED),
                (&*EIN_STANDALONE, LOOSE),
            ],
        ),
        Rule::field(
            W2Field::EmployerName,
            &[(&*EMPLOYER_NAME_ADDRESS, LABELED), (&*EMPLOYER_NAME, LOOSE)],
        ),
        Rule::labeled_block(&EMPLOYEE_NAME_LABELS, EMPLOYEE_NAME),
        Rule::block(&EMPLOYEE_NAME_LABELS_RUN, EMPLOYEE_NAME),
        Rule::name_split(&EMPLOYEE_NAME_ADDRESS),
        Rule::block(&JUMBLED_SOCIAL_SECURITY, SOCIAL_SECURITY),
        Rule::block(&JUMBLED_MEDICARE, MEDICARE),
        Rule::block(&JUMBLED_STATE_ID, STATE_AND_ID),
        Rule::block(&JUMBLED_STATE_ID_RUN, STATE_AND_ID),
        Rule::block(&JUMBLED_STATE_WAGES_RUN, STATE_AMOUNTS),
        Rule::block(&JUMBLED_STATE_WAGES, STATE_AMOUNTS),
        Rule::field(W2Field::Wages, &[(&*WAGES, LABELED), (&*WAGES_LOOSE, LOOSE)]),
        Rule::field(
            W2Field::FederalWithholding,
            &[
                (&*FEDERAL_WITHHOLDING, LABELED),
                (&*FEDERAL_WITHHOLDING_LOOSE, LOOSE),
            ],
        ),
        Rule::field(
            W2Field::SocialSecurityWages,
            &[
                (&*SOCIAL_SECURITY_WAGES, LABELED),
                (&*SOCIAL_SECURITY_WAGES_LOOSE, LOOSE),
            ],
        ),
        Rule::field(
            W2Field::SocialSecurityTax,
            &[
                (&*SOCIAL_SECURITY_TAX, LABELED),
                (&*SOCIAL_SECURITY_TAX_LOOSE, LOOSE),
            ],
        ),
        Rule::field(
            W2Field::MedicareWages,
            &[(&*MEDICARE_WAGES, LABELED), (&*MEDICARE_WAGES_LOOSE, LOOSE)],
        ),
        Rule::field(
            W2Field::MedicareTax,
            &[(&*MEDICARE_TAX, LABELED), (&*MEDICARE_TAX_LOOSE, LOOSE)],
        ),
        Rule::field(
            W2Field::State,
            &[
                (&*STATE_BOX, LABELED),
                (&*STATE_LABELED, LABELED),
                (&*STATE_LOOSE, LOOSE),
            ],
        ),
        Rule::field(
            W2Field::EmployerStateId,
            &[(&*STATE_ID, LABELED), (&*STATE_ID_LOOSE, LOOSE)],
        ),
        Rule::field(
            W2Field::StateWages,
            &[(&*STATE_WAGES, LABELED), (&*STATE_WAGES_LOOSE, LOOSE)],
        ),
        Rule::field(
            W2Field::StateWithholding,
            &[
                (&*STATE_WITHHOLDING, LABELED),
                (&*STATE_WITHHOLDING_LOOSE, LOOSE),
            ],
        ),
    ]
}

lazy_static! {
    pub static ref CLEAN_TABLE: DialectTable = DialectTable {
        dialect: LayoutDialect::Clean,
        rules: clean_rules(),
    };

    pub static ref JUMBLED_TABLE: DialectTable = DialectTable {
        dialect: LayoutDialect::Jumbled,
        rules: jumbled_rules(),
    };

    pub static ref FALLBACK_TABLE: DialectTable = DialectTable {
        dialect: LayoutDialect::Fallback,
        rules: fallback_rules(),
    };
}
