//! Number parsing and formatting helpers
//!
//! The settlement page publishes prices as text, and depending on the page
//! locale they use either `1,234.56` or `1.234,56`. Everything that needs a
//! numeric value goes through [`parse_published_number`].

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::str::FromStr;

/// Parse a published price, variation or settlement value.
///
/// Accepts an optional `R$` prefix, a leading sign, and either decimal
/// convention. When both `.` and `,` appear, whichever comes last is the
/// decimal separator. A lone separator that appears more than once is a
/// thousands separator; a single occurrence is the decimal separator.
/// Blank or malformed input yields `None`.
///
/// # Examples
/// ```
/// use b3futures::utils::parse_published_number;
/// use rust_decimal_macros::dec;
///
/// assert_eq!(parse_published_number("1,234.56"), Some(dec!(1234.56)));
/// assert_eq!(parse_published_number("1.234,56"), Some(dec!(1234.56)));
/// assert_eq!(parse_published_number("-0,5"), Some(dec!(-0.5)));
/// assert_eq!(parse_published_number(""), None);
/// ```
pub fn parse_published_number(input: &str) -> Option<Decimal> {
    let cleaned: String = input
        .trim()
        .trim_start_matches("R$")
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '\u{a0}')
        .collect();
    let cleaned = cleaned.strip_prefix('+').unwrap_or(&cleaned);
    if cleaned.is_empty() {
        return None;
    }

    let last_dot = cleaned.rfind('.');
    let last_comma = cleaned.rfind(',');
    let normalized = match (last_dot, last_comma) {
        (Some(dot), Some(comma)) if comma > dot => cleaned.replace('.', "").replace(',', "."),
        (Some(_), Some(_)) => cleaned.replace(',', ""),
        (None, Some(_)) if cleaned.matches(',').count() > 1 => cleaned.replace(',', ""),
        (None, Some(_)) => cleaned.replace(',', "."),
        (Some(_), None) if cleaned.matches('.').count() > 1 => cleaned.replace('.', ""),
        _ => cleaned.to_string(),
    };

    Decimal::from_str(&normalized).ok()
}

/// Same as [`parse_published_number`], as `f64` for chart axes
pub fn published_number_f64(input: &str) -> Option<f64> {
    parse_published_number(input).and_then(|d| d.to_f64())
}

/// Format as Brazilian Real with symbol: "R$ 1.234,56"
///
/// # Examples
/// ```
/// use b3futures::utils::format_currency;
/// use rust_decimal_macros::dec;
///
/// assert_eq!(format_currency(dec!(1234.56)), "R$ 1.234,56");
/// assert_eq!(format_currency(dec!(-500)), "R$ -500,00");
/// ```
pub fn format_currency(value: Decimal) -> String {
    let formatted = format!("{:.2}", value.abs());
    let (integer_part, decimal_part) = formatted.split_once('.').unwrap_or((formatted.as_str(), "00"));

    let digits: Vec<char> = integer_part.chars().collect();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.iter().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(*c);
    }

    let sign = if value < Decimal::ZERO { "-" } else { "" };
    format!("R$ {}{},{}", sign, grouped, decimal_part)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_parse_english_notation() {
        assert_eq!(parse_published_number("99,250.123"), Some(dec!(99250.123)));
        assert_eq!(parse_published_number("1,000,000"), Some(dec!(1000000)));
        assert_eq!(parse_published_number("0.25"), Some(dec!(0.25)));
    }

    #[test]
    fn test_parse_brazilian_notation() {
        assert_eq!(parse_published_number("14.160,95"), Some(dec!(14160.95)));
        assert_eq!(parse_published_number("1.000.000"), Some(dec!(1000000)));
        assert_eq!(parse_published_number("R$ 10,50"), Some(dec!(10.50)));
    }

    #[test]
    fn test_parse_signs_and_plain_integers() {
        assert_eq!(parse_published_number("+1.0"), Some(dec!(1.0)));
        assert_eq!(parse_published_number("-12,3"), Some(dec!(-12.3)));
        assert_eq!(parse_published_number("1000000"), Some(dec!(1000000)));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert_eq!(parse_published_number("   "), None);
        assert_eq!(parse_published_number("-"), None);
        assert_eq!(parse_published_number("n/a"), None);
    }

    #[test]
    fn test_published_number_f64() {
        assert_eq!(published_number_f64("101,0"), Some(101.0));
        assert_eq!(published_number_f64(""), None);
    }

    #[test]
    fn test_format_currency() {
        assert_eq!(format_currency(dec!(0)), "R$ 0,00");
        assert_eq!(format_currency(dec!(999.99)), "R$ 999,99");
        assert_eq!(format_currency(dec!(1000)), "R$ 1.000,00");
        assert_eq!(format_currency(dec!(12345678.90)), "R$ 12.345.678,90");
        assert_eq!(format_currency(dec!(-1234.56)), "R$ -1.234,56");
    }
}
