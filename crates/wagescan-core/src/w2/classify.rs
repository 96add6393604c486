//! Layout dialect classification.

use crate::models::w2::LayoutDialect;

/// Label that only appears with a colon in the clean layout.
const CLEAN_LABEL: &str = "social security number:";

/// The OCR misreading of "identification number" typical of the jumbled
/// layout.
const JUMBLED_MARKER: &str = "identitication number";

/// Collapse every whitespace run to a single space and trim the ends.
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Classify text into a layout dialect. Checks run in a fixed order and the
/// first hit wins.
pub fn classify(text: &str) -> LayoutDialect {
    let lower = text.to_lowercase();

    if lower.contains(CLEAN_LABEL) && lower.contains('$') {
        LayoutDialect::Clean
    } else if lower.contains(JUMBLED_MARKER) {
        LayoutDialect::Jumbled
    } else {
        LayoutDialect::Fallback
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_whitespace() {
        assert_eq!(normalize_whitespace("  a\n\tb   c \r\n"), "a b c");
        assert_eq!(normalize_whitespace(" \n\t "), "");
    }

    #[test]
    fn test_classify() {
        assert_eq!(
            classify("Employee's Social Security Number: 123-45-6789 Wages: $1.00"),
            LayoutDialect::Clean
        );
        assert_eq!(
            classify("Employer identitication number (EIN) 1 Wages"),
            LayoutDialect::Jumbled
        );
        assert_eq!(classify("hello world"), LayoutDialect::Fallback);
    }

    #[test]
    fn test_clean_needs_currency_symbol() {
        assert_eq!(
            classify("social security number: 123-45-6789 wages 100"),
            LayoutDialect::Fallback
        );
    }

    #[test]
    fn test_clean_wins_over_jumbled() {
        let text = "identitication number social security number: 123-45-6789 $5";
        assert_eq!(classify(text), LayoutDialect::Clean);
    }
}
