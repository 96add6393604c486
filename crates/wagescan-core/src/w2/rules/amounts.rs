//! Money amount parsing and formatting.

use rust_decimal::Decimal;
use std::str::FromStr;

/// Parse a W-2 money amount ("$50,000.00", "45000", "1,234.5").
///
/// Currency symbols, thousands separators and whitespace are dropped.
/// Negative or otherwise malformed numbers yield `None`.
pub fn parse_amount(s: &str) -> Option<Decimal> {
    let cleaned: String = s
        .chars()
        .filter(|c| !matches!(c, '$' | ',') && !c.is_whitespace())
        .collect();
    let cleaned = cleaned.trim_end_matches('.');

    if cleaned.is_empty() || !cleaned.chars().all(|c| c.is_ascii_digit() || c == '.') {
        return None;
    }

    Decimal::from_str(cleaned).ok().filter(|d| !d.is_sign_negative())
}

/// Format an amount US style with two decimals (50,000.00).
pub fn format_amount(amount: Decimal) -> String {
    let s = format!("{:.2}", amount);
    let (integer_part, decimal_part) = match s.split_once('.') {
        Some(parts) => parts,
        None => return s,
    };
    let (sign, digits) = match integer_part.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", integer_part),
    };

    let chars: Vec<char> = digits.chars().collect();
    let mut formatted = String::with_capacity(chars.len() + chars.len() / 3);
    for (i, c) in chars.iter().enumerate() {
        if i > 0 && (chars.len() - i) % 3 == 0 {
            formatted.push(',');
        }
        formatted.push(*c);
    }

    format!("{}{}.{}", sign, formatted, decimal_part)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_parse_amount() {
        assert_eq!(parse_amount("$50,000.00"), Some(dec("50000.00")));
        assert_eq!(parse_amount("45000"), Some(dec("45000")));
        assert_eq!(parse_amount("$ 1,234.5"), Some(dec("1234.5")));
        assert_eq!(parse_amount("5000."), Some(dec("5000")));
        assert_eq!(parse_amount("0.00"), Some(Decimal::ZERO));
    }

    #[test]
    fn test_parse_amount_rejects_garbage() {
        assert_eq!(parse_amount(""), None);
        assert_eq!(parse_amount("$"), None);
        assert_eq!(parse_amount("-100.00"), None);
        assert_eq!(parse_amount("1.2.3"), None);
        assert_eq!(parse_amount("12a4"), None);
    }

    #[test]
    fn test_format_amount() {
        assert_eq!(format_amount(dec("50000")), "50,000.00");
        assert_eq!(format_amount(dec("1234567.891")), "1,234,567.89");
        assert_eq!(format_amount(dec("999.5")), "999.50");
        assert_eq!(format_amount(Decimal::ZERO), "0.00");
    }

    #[test]
    fn test_parsed_amount_reparses_from_display() {
        for raw in ["1,234.56", "$50,000.00", "45000", "0.00"] {
            let amount = parse_amount(raw).unwrap();
            assert_eq!(parse_amount(&amount.to_string()), Some(amount), "{}", raw);
        }
        assert_eq!(parse_amount("1,234.56").unwrap().to_string(), "1234.56");
    }

    #[test]
    fn test_formatted_amount_parses_back() {
        let amount = dec("98765.43");
        assert_eq!(parse_amount(&format_amount(amount)), Some(amount));
    }
}
