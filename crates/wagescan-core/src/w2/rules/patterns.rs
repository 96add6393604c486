//! Regex patterns for W-2 label/value extraction.
//!
//! Every pattern runs against whitespace-normalized text (single spaces, no
//! newlines), so `.` never has to cross a line break.

use lazy_static::lazy_static;
use regex::Regex;

/// Apostrophe as it comes out of PDFs and OCR, or missing entirely.
const APOS: &str = r"['’`]?";

/// Money with an optional currency symbol; group 1 is the number.
const MONEY: &str = r"\$?\s*([0-9][0-9,]*(?:\.[0-9]+)?)";

/// Amount-shaped number for loose matching: thousands groups, cents, or at
/// least three digits. Keeps single-digit box numbers from matching.
const LOOSE_AMOUNT: &str = r"([0-9]{1,3}(?:,[0-9]{3})+(?:\.[0-9]{2})?|[0-9]+\.[0-9]{2}|[0-9]{3,})";

/// SSN, tolerant of redaction with X or *.
const SSN: &str = r"([0-9Xx*]{3}[- ]?[0-9Xx*]{2}[- ]?[0-9Xx*]{4})";

/// EIN digits, hyphen optional.
const EIN: &str = r"([0-9]{2}[- ]?[0-9]{7})";

fn re(pattern: &str) -> Regex {
    Regex::new(pattern).unwrap()
}

lazy_static! {
    // Identifiers
    pub static ref SSN_LABELED: Regex = re(&format!(
        r"(?i)(?:employee{APOS}s?\s+)?social\s+security\s+number:?\s*{SSN}"
    ));

    pub static ref SSN_SHORT_LABEL: Regex = re(&format!(r"(?i)\bSSN:?\s*{SSN}"));

    pub static ref SSN_STANDALONE: Regex = re(r"\b([0-9]{3}-[0-9]{2}-[0-9]{4})\b");

    pub static ref EIN_LABELED: Regex = re(&format!(
        r"(?i)employer\s+identification\s+number(?:\s*\(EIN\))?:?\s*{EIN}"
    ));

    pub static ref EIN_SHORT_LABEL: Regex = re(&format!(r"(?i)\bEIN\)?:?\s*{EIN}"));

    pub static ref EIN_STANDALONE: Regex = re(r"\b([0-9]{2}-[0-9]{7})\b");

    // Employer name and address (span, cut at the next label)
    pub static ref EMPLOYER_NAME_ADDRESS: Regex = re(&format!(
        r"(?i)employer{APOS}s?\s+name,?\s+address,?\s+and\s+ZIP\s+code:?\s*(.+)"
    ));

    /// Bare "name" caption; a following comma is the combined
    /// name-and-address caption, handled above.
    pub static ref EMPLOYER_NAME: Regex = re(&format!(
        r"(?i)employer{APOS}s?\s+name(?:\s*:\s*|\s+)(.+)"
    ));

    // Employee name
    pub static ref EMPLOYEE_NAME_LABELS: Regex = re(&format!(
        r"(?i)employee{APOS}s?\s+first\s+name\s+and\s+initial:?\s*([A-Z][A-Z.'\- ]*?)\s+last\s+name:?\s*([A-Z][A-Z'\-]*)"
    ));

    /// Both captions first, then both values ("... Last name Suff. JOHN A SMITH").
    pub static ref EMPLOYEE_NAME_LABELS_RUN: Regex = re(&format!(
        r"(?i)employee{APOS}s?\s+first\s+name\s+and\s+initial\s+last\s+name(?:\s+suff\.?)?\s+([A-Z][A-Z'\-]*(?:\s+[A-Z]\.?)?)\s+([A-Z][A-Z'\-]*)"
    ));

    pub static ref EMPLOYEE_NAME_ADDRESS: Regex = re(&format!(
        r"(?i)employee{APOS}s?\s+name,?\s+address,?\s+and\s+ZIP\s+code:?\s*(.+)"
    ));

    // Labeled amounts: label, optional colon, optional currency symbol
    pub static ref WAGES: Regex = re(&format!(
        r"(?i)wages,?\s+tips,?\s+(?:and\s+)?other\s+compensation:?\s*{MONEY}"
    ));

    pub static ref FEDERAL_WITHHOLDING: Regex = re(&format!(
        r"(?i)federal\s+income\s+tax\s+withheld:?\s*{MONEY}"
    ));

    pub static ref SOCIAL_SECURITY_WAGES: Regex = re(&format!(
        r"(?i)social\s+security\s+wages:?\s*{MONEY}"
    ));

    pub static ref SOCIAL_SECURITY_TAX: Regex = re(&format!(
        r"(?i)social\s+security\s+tax\s+withheld:?\s*{MONEY}"
    ));

    pub static ref MEDICARE_WAGES: Regex = re(&format!(
        r"(?i)medicare\s+wages\s+and\s+tips:?\s*{MONEY}"
    ));

    pub static ref MEDICARE_TAX: Regex = re(&format!(
        r"(?i)medicare\s+tax\s+withheld:?\s*{MONEY}"
    ));

    pub static ref STATE_WAGES: Regex = re(&format!(
        r"(?i)state\s+wages,?\s+tips,?\s+etc\.?:?\s*{MONEY}"
    ));

    pub static ref STATE_WITHHOLDING: Regex = re(&format!(
        r"(?i)state\s+income\s+tax(?:\s+withheld)?:?\s*{MONEY}"
    ));

    // State and state ID
    pub static ref STATE_BOX: Regex = re(r"(?i)\b15\s+state:?\s*([A-Z]{2})\b");

    pub static ref STATE_LABELED: Regex = re(r"(?i)\bstate:\s*([A-Z]{2})\b");

    /// Bare "state XX" followed by a number (the state ID or box 16).
    pub static ref STATE_LOOSE: Regex = re(r"(?i)\bstate:?\s+([A-Z]{2})\s+[0-9]");

    pub static ref STATE_ID: Regex = re(&format!(
        r"(?i)employer{APOS}s?\s+state\s+I\.?D\.?(?:\s+(?:number|no\.?))?:?\s*([A-Z0-9][A-Z0-9\-]*)"
    ));

    pub static ref STATE_ID_LOOSE: Regex = re(
        r"(?i)\bstate\s+I\.?D\.?(?:\s+(?:number|no\.?))?:?\s*([A-Z0-9][A-Z0-9\-]{2,})"
    );

    // Jumbled layout: contiguous caption runs followed by their values
    pub static ref JUMBLED_EIN_WAGES_FEDERAL: Regex = re(&format!(
        r"(?i)employer\s+identi[tf]ication\s+number\s*\(?EIN\)?\s*(?:1\s+)?wages,?\s+tips,?\s+other\s+compensation\s*(?:2\s+)?federal\s+income\s+tax\s+withheld\s*([A-Z0-9][A-Z0-9\-]*)\s+{MONEY}\s+{MONEY}"
    ));

    pub static ref JUMBLED_SOCIAL_SECURITY: Regex = re(&format!(
        r"(?i)social\s+security\s+wages\s*(?:4\s+)?social\s+security\s+tax\s+withheld\s*{MONEY}\s+{MONEY}"
    ));

    pub static ref JUMBLED_MEDICARE: Regex = re(&format!(
        r"(?i)medicare\s+wages\s+and\s+tips\s*(?:6\s+)?medicare\s+tax\s+withheld\s*{MONEY}\s+{MONEY}"
    ));

    pub static ref JUMBLED_STATE_ID: Regex = re(&format!(
        r"(?i)\b15\s+state\s*([A-Z]{{2}})\s*employer{APOS}s?\s+state\s+I\.?D\.?\s+number:?\s*([A-Z0-9][A-Z0-9\-]*)"
    ));

    pub static ref JUMBLED_STATE_ID_RUN: Regex = re(&format!(
        r"(?i)\b15\s+state\s+employer{APOS}s?\s+state\s+I\.?D\.?\s+number:?\s*([A-Z]{{2}})\s+([A-Z0-9][A-Z0-9\-]*)"
    ));

    pub static ref JUMBLED_STATE_WAGES: Regex = re(&format!(
        r"(?i)state\s+wages,?\s+tips,?\s+etc\.?\s*{MONEY}\s*(?:17\s+)?state\s+income\s+tax\s*{MONEY}"
    ));

    pub static ref JUMBLED_STATE_WAGES_RUN: Regex = re(&format!(
        r"(?i)state\s+wages,?\s+tips,?\s+etc\.?\s*(?:17\s+)?state\s+income\s+tax\s*{MONEY}\s+{MONEY}"
    ));

    // Loose amount patterns: keyword, then the first amount-shaped number
    // within a short window
    pub static ref WAGES_LOOSE: Regex = re(&format!(
        r"(?i)other\s+compensation\D{{0,40}}?{LOOSE_AMOUNT}"
    ));

    pub static ref FEDERAL_WITHHOLDING_LOOSE: Regex = re(&format!(
        r"(?i)federal\s+income\s+tax\D{{0,40}}?{LOOSE_AMOUNT}"
    ));

    pub static ref SOCIAL_SECURITY_WAGES_LOOSE: Regex = re(&format!(
        r"(?i)social\s+security\s+wages\D{{0,40}}?{LOOSE_AMOUNT}"
    ));

    pub static ref SOCIAL_SECURITY_TAX_LOOSE: Regex = re(&format!(
        r"(?i)social\s+security\s+tax\D{{0,40}}?{LOOSE_AMOUNT}"
    ));

    pub static ref MEDICARE_WAGES_LOOSE: Regex = re(&format!(
        r"(?i)medicare\s+wages\D{{0,40}}?{LOOSE_AMOUNT}"
    ));

    pub static ref MEDICARE_TAX_LOOSE: Regex = re(&format!(
        r"(?i)medicare\s+tax\D{{0,40}}?{LOOSE_AMOUNT}"
    ));

    pub static ref STATE_WAGES_LOOSE: Regex = re(&format!(
        r"(?i)state\s+wages\D{{0,40}}?{LOOSE_AMOUNT}"
    ));

    pub static ref STATE_WITHHOLDING_LOOSE: Regex = re(&format!(
        r"(?i)state\s+income\s+tax\D{{0,40}}?{LOOSE_AMOUNT}"
    ));

    /// Start of the next known caption. Spans (employer name, employee
    /// name) end here.
    pub static ref LABEL_BOUNDARY: Regex = re(&format!(
        r"(?i)\b(?:employee{APOS}s?\s|employer{APOS}s?\s|employer\s+identi|wages,?\s+tips|federal\s+income|social\s+security|medicare\s+(?:wages|tax)|state\s+wages|state\s+income|15\s+state|control\s+number|dependent\s+care|nonqualified\s+plans|allocated\s+tips|statutory\s+employee|retirement\s+plan|third-party\s+sick|local\s+wages|locality\s+name|form\s+w-2|wage\s+and\s+tax\s+statement|copy\s+[a-d0-9]\b|omb\s+no)"
    ));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_patterns_compile() {
        // Force every lazy pattern; a bad pattern panics here instead of
        // in the middle of a document.
        let patterns: Vec<&Regex> = vec![
            &*SSN_LABELED,
            &*SSN_SHORT_LABEL,
            &*SSN_STANDALONE,
            &*EIN_LABELED,
            &*EIN_SHORT_LABEL,
            &*EIN_STANDALONE,
            &*EMPLOYER_NAME_ADDRESS,
            &*EMPLOYER_NAME,
            &*EMPLOYEE_NAME_LABELS,
            &*EMPLOYEE_NAME_LABELS_RUN,
            &*EMPLOYEE_NAME_ADDRESS,
            &*WAGES,
            &*FEDERAL_WITHHOLDING,
            &*SOCIAL_SECURITY_WAGES,
            &*SOCIAL_SECURITY_TAX,
            &*MEDICARE_WAGES,
            &*MEDICARE_TAX,
            &*STATE_WAGES,
            &*STATE_WITHHOLDING,
            &*STATE_BOX,
            &*STATE_LABELED,
            &*STATE_LOOSE,
            &*STATE_ID,
            &*STATE_ID_LOOSE,
            &*JUMBLED_EIN_WAGES_FEDERAL,
            &*JUMBLED_SOCIAL_SECURITY,
            &*JUMBLED_MEDICARE,
            &*JUMBLED_STATE_ID,
            &*JUMBLED_STATE_ID_RUN,
            &*JUMBLED_STATE_WAGES,
            &*JUMBLED_STATE_WAGES_RUN,
            &*WAGES_LOOSE,
            &*FEDERAL_WITHHOLDING_LOOSE,
            &*SOCIAL_SECURITY_WAGES_LOOSE,
            &*SOCIAL_SECURITY_TAX_LOOSE,
            &*MEDICARE_WAGES_LOOSE,
            &*MEDICARE_TAX_LOOSE,
            &*STATE_WAGES_LOOSE,
            &*STATE_WITHHOLDING_LOOSE,
            &*LABEL_BOUNDARY,
        ];
        assert!(patterns.iter().all(|p| !p.as_str().is_empty()));
    }

    #[test]
    fn test_wages_with_currency() {
        let caps = WAGES
            .captures("1 Wages, tips, other compensation: $50,000.00 2 Federal")
            .unwrap();
        assert_eq!(&caps[1], "50,000.00");
    }

    #[test]
    fn test_ssn_redacted() {
        let caps = SSN_LABELED
            .captures("a Employee's social security number XXX-XX-1234 OMB No.")
            .unwrap();
        assert_eq!(&caps[1], "XXX-XX-1234");
    }

    #[test]
    fn test_ssn_without_employee_prefix() {
        let caps = SSN_LABELED
            .captures("Social security number: 123-45-6789 Wages")
            .unwrap();
        assert_eq!(&caps[1], "123-45-6789");
    }

    #[test]
    fn test_employer_name_skips_combined_caption() {
        assert!(EMPLOYER_NAME
            .captures("c Employer's name, address, and ZIP code d Control number")
            .is_none());
        let caps = EMPLOYER_NAME.captures("Employer's name: ACME CORP").unwrap();
        assert_eq!(&caps[1], "ACME CORP");
    }

    #[test]
    fn test_loose_amount_skips_box_numbers() {
        assert!(SOCIAL_SECURITY_WAGES_LOOSE
            .captures("Social security wages 4 Social security tax withheld")
            .is_none());
        let caps = MEDICARE_WAGES_LOOSE
            .captures("Medicare wages & tips .... $ 41,250.00")
            .unwrap();
        assert_eq!(&caps[1], "41,250.00");
    }

    #[test]
    fn test_state_loose_ignores_state_id_caption() {
        assert!(STATE_LOOSE.captures("Employer's state ID number 16").is_none());
        let caps = STATE_LOOSE.captures("15 State CA 123-4567-8").unwrap();
        assert_eq!(&caps[1], "CA");
    }
}
