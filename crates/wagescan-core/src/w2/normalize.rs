//! Coercion of raw captured strings into typed field values.

use crate::models::w2::{FieldValue, W2Field};

use super::rules::amounts::parse_amount;
use super::rules::identifiers::{is_state_code, normalize_ein, normalize_ssn};
use super::rules::patterns::LABEL_BOUNDARY;

/// Coerce a raw capture for `field`. `None` means the capture is not a
/// usable value and the next strategy should be tried.
pub fn coerce(field: W2Field, raw: &str) -> Option<FieldValue> {
    if field.is_monetary() {
        return parse_amount(raw).map(FieldValue::Amount);
    }

    let text = match field {
        W2Field::EmployeeSsn => normalize_ssn(raw)?,
        W2Field::EmployerEin => normalize_ein(raw)?,
        W2Field::EmployerName => {
            let span = clean_span(raw)?;
            // Leftover of the "name, address, and ZIP code" caption
            let first_word = span.split_whitespace().next().unwrap_or_default();
            if first_word.trim_end_matches(',').eq_ignore_ascii_case("address") {
                return None;
            }
            span
        }
        W2Field::EmployeeFirstName | W2Field::EmployeeLastName => clean_name(raw)?,
        W2Field::State => {
            let code = raw.trim().to_ascii_uppercase();
            if !is_state_code(&code) {
                return None;
            }
            code
        }
        W2Field::EmployerStateId => clean_state_id(raw)?,
        _ => return None,
    };

    Some(FieldValue::Text(text))
}

/// Cut a free-text span at the next known caption and tidy its ends.
pub fn cut_at_boundary(span: &str) -> &str {
    match LABEL_BOUNDARY.find(span) {
        Some(m) => &span[..m.start()],
        None => span,
    }
}

/// Split "JOHN A SMITH 123 MAIN ST" into ("JOHN", "A SMITH").
///
/// Tokens are taken up to the first one containing a digit (the address).
/// The first token is the first name and the rest the last name; middle
/// initials therefore land in the last name.
pub fn split_name(span: &str) -> Option<(String, Option<String>)> {
    let tokens: Vec<&str> = cut_at_boundary(span)
        .split_whitespace()
        .take_while(|t| !t.chars().any(|c| c.is_ascii_digit()))
        .map(|t| t.trim_matches(|c: char| c == ',' || c == ';' || c == ':'))
        .filter(|t| !t.is_empty())
        .collect();

    let (first, rest) = tokens.split_first()?;
    let last = if rest.is_empty() {
        None
    } else {
        Some(rest.join(" "))
    };
    Some((first.to_string(), last))
}

fn clean_span(raw: &str) -> Option<String> {
    let mut tokens: Vec<&str> = cut_at_boundary(raw).split_whitespace().collect();

    // A trailing one- or two-digit token is the next box number, not part
    // of the address (ZIP codes have five digits).
    while let Some(last) = tokens.last() {
        let is_box_number = last.len() <= 2 && last.chars().all(|c| c.is_ascii_digit());
        let is_box_letter = last.len() == 1 && last.chars().all(|c| c.is_ascii_lowercase());
        if is_box_number || is_box_letter {
            tokens.pop();
        } else {
            break;
        }
    }

    let text = tokens
        .join(" ")
        .trim_matches(|c: char| c == ',' || c == ';' || c == ':' || c.is_whitespace())
        .to_string();
    (!text.is_empty()).then_some(text)
}

fn clean_name(raw: &str) -> Option<String> {
    let name = raw
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .trim_matches(|c: char| c == ',' || c == ';' || c == ':')
        .to_string();

    if name.is_empty() || name.chars().any(|c| c.is_ascii_digit()) {
        return None;
    }
    Some(name)
}

fn clean_state_id(raw: &str) -> Option<String> {
    let id = raw.trim().trim_end_matches(|c: char| c == '-' || c == '.');
    if id.is_empty() {
        return None;
    }
    // A bare one- or two-digit number is the next box caption.
    if id.len() <= 2 && id.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    Some(id.to_ascii_uppercase())
}
