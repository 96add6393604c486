//! SSN, EIN and state code normalization and validation.

/// USPS codes accepted in box 15: the states, DC and the territories that
/// issue W-2s.
pub const US_STATE_CODES: [&str; 56] = [
    "AL", "AK", "AZ", "AR", "CA", "CO", "CT", "DE", "FL", "GA", "HI", "ID", "IL", "IN", "IA", "KS",
    "KY", "LA", "ME", "MD", "MA", "MI", "MN", "MS", "MO", "MT", "NE", "NV", "NH", "NJ", "NM", "NY",
    "NC", "ND", "OH", "OK", "OR", "PA", "RI", "SC", "SD", "TN", "TX", "UT", "VT", "VA", "WA", "WV",
    "WI", "WY", "DC", "PR", "GU", "VI", "AS", "MP",
];

/// EIN prefixes the IRS has never assigned.
const UNASSIGNED_EIN_PREFIXES: [u32; 17] = [
    0, 7, 8, 9, 17, 18, 19, 28, 29, 49, 69, 70, 78, 79, 89, 96, 97,
];

/// Normalize an SSN to `NNN-NN-NNNN`. Redaction characters (X, *) are kept,
/// upper-cased. Returns `None` unless exactly nine significant characters
/// remain.
pub fn normalize_ssn(raw: &str) -> Option<String> {
    let chars: Vec<char> = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || matches!(c, 'x' | 'X' | '*'))
        .map(|c| c.to_ascii_uppercase())
        .collect();

    if chars.len() != 9 {
        return None;
    }

    let s: String = chars.into_iter().collect();
    Some(format!("{}-{}-{}", &s[..3], &s[3..5], &s[5..]))
}

/// Whether the SSN could have been issued. Redacted SSNs are accepted as
/// long as the visible digits are plausible.
pub fn validate_ssn(ssn: &str) -> bool {
    let Some(normalized) = normalize_ssn(ssn) else {
        return false;
    };
    let parts: Vec<&str> = normalized.split('-').collect();
    let (area, group, serial) = (parts[0], parts[1], parts[2]);

    if let Ok(area) = area.parse::<u32>() {
        if area == 0 || area == 666 || area >= 900 {
            return false;
        }
    }
    if group == "00" || serial == "0000" {
        return false;
    }
    true
}

/// Normalize an EIN to `NN-NNNNNNN`.
///
/// Values that do not have nine digits are passed through upper-cased, so
/// OCR-damaged identifiers still reach the caller (and fail validation).
pub fn normalize_ein(raw: &str) -> Option<String> {
    let trimmed = raw.trim().trim_matches(|c: char| c == '-' || c == '.');
    if trimmed.is_empty() {
        return None;
    }

    let digits: String = trimmed.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.len() == 9 && trimmed.chars().all(|c| c.is_ascii_digit() || c == '-' || c == ' ') {
        return Some(format!("{}-{}", &digits[..2], &digits[2..]));
    }

    if digits.is_empty() || trimmed.len() < 2 {
        return None;
    }
    Some(trimmed.to_ascii_uppercase())
}

/// Whether the EIN has nine digits and an assigned prefix.
pub fn validate_ein(ein: &str) -> bool {
    if !ein.chars().all(|c| c.is_ascii_digit() || c == '-') {
        return false;
    }
    let digits: String = ein.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.len() != 9 {
        return false;
    }
    match digits[..2].parse::<u32>() {
        Ok(prefix) => !UNASSIGNED_EIN_PREFIXES.contains(&prefix),
        Err(_) => false,
    }
}

/// Whether the two-letter code is a USPS state or territory code.
pub fn is_state_code(code: &str) -> bool {
    let upper = code.trim().to_ascii_uppercase();
    US_STATE_CODES.contains(&upper.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_ssn() {
        assert_eq!(normalize_ssn("123-45-6789").as_deref(), Some("123-45-6789"));
        assert_eq!(normalize_ssn("123 45 6789").as_deref(), Some("123-45-6789"));
        assert_eq!(normalize_ssn("xxx-xx-1234").as_deref(), Some("XXX-XX-1234"));
        assert_eq!(normalize_ssn("12-345-678"), None);
    }

    #[test]
    fn test_validate_ssn() {
        assert!(validate_ssn("123-45-6789"));
        assert!(validate_ssn("XXX-XX-6789"));
        assert!(!validate_ssn("000-12-3456"));
        assert!(!validate_ssn("666-12-3456"));
        assert!(!validate_ssn("912-34-5678"));
        assert!(!validate_ssn("123-00-4567"));
        assert!(!validate_ssn("123-45-0000"));
    }

    #[test]
    fn test_normalize_ein() {
        assert_eq!(normalize_ein("12-3456789").as_deref(), Some("12-3456789"));
        assert_eq!(normalize_ein("123456789").as_deref(), Some("12-3456789"));
        assert_eq!(normalize_ein("12-34567B9").as_deref(), Some("12-34567B9"));
        assert_eq!(normalize_ein("ABC"), None);
        assert_eq!(normalize_ein("-"), None);
    }

    #[test]
    fn test_validate_ein() {
        assert!(validate_ein("12-3456789"));
        assert!(validate_ein("95-1234567"));
        assert!(!validate_ein("07-1234567"));
        assert!(!validate_ein("00-1234567"));
        assert!(!validate_ein("12-345678"));
        assert!(!validate_ein("12-34567B9"));
    }

    #[test]
    fn test_state_codes() {
        assert!(is_state_code("CA"));
        assert!(is_state_code("ny"));
        assert!(is_state_code("DC"));
        assert!(!is_state_code("XX"));
        assert!(!is_state_code("CAL"));
    }
}
