// src/table/numbers.rs

use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::Decimal;
use std::str::FromStr;

static YEAR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{4})(?:\D.*)?$").expect("year regex should compile"));

/// Trim whitespace + strip outer quotes if present.
pub fn clean_str(raw: &str) -> &str {
    let trimmed = raw.trim();
    if trimmed.len() >= 2 && trimmed.starts_with('"') && trimmed.ends_with('"') {
        trimmed[1..trimmed.len() - 1].trim()
    } else {
        trimmed
    }
}

/// Parse a locale-formatted decimal: `1,23`, `1.23`, `1.234,56`,
/// `1,234.56`, with an optional `%` and inner whitespace. The right-most
/// of `,`/`.` is taken as the decimal separator. Returns `None` for empty
/// cells, dashes and anything else that is not a number.
pub fn parse_decimal(raw: &str) -> Option<Decimal> {
    let s: String = clean_str(raw)
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '%')
        .collect();
    if s.is_empty() {
        return None;
    }

    let normalized = match (s.rfind(','), s.rfind('.')) {
        (Some(comma), Some(dot)) if comma > dot => s.replace('.', "").replace(',', "."),
        (Some(_), Some(_)) => s.replace(',', ""),
        (Some(_), None) => s.replace(',', "."),
        _ => s,
    };
    Decimal::from_str(&normalized).ok()
}

/// Parse a user-typed amount. Same rules as [`parse_decimal`], except that
/// dots with no comma, each followed by exactly three digits, are thousands
/// separators: `1.000` is one thousand, `1.000.000` one million, `1.5` and
/// `1.0000` stay decimals.
pub fn parse_amount(raw: &str) -> Option<Decimal> {
    let s = clean_str(raw);
    let mut groups = s.split('.');
    let grouped = !s.contains(',')
        && s.contains('.')
        && groups
            .next()
            .is_some_and(|g| !g.is_empty() && g.len() <= 3 && g.chars().all(|c| c.is_ascii_digit()))
        && groups.all(|g| g.len() == 3 && g.chars().all(|c| c.is_ascii_digit()));
    if grouped {
        Decimal::from_str(&s.replace('.', "")).ok()
    } else {
        parse_decimal(s)
    }
}

/// Parse the year column. Footnote markers after the four digits
/// (`2024*`, `2024 (1)`) are ignored.
pub fn parse_year(raw: &str) -> Option<i32> {
    YEAR_RE
        .captures(clean_str(raw))
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_parse_decimal_separators() {
        assert_eq!(parse_decimal("1,23"), Some(dec!(1.23)));
        assert_eq!(parse_decimal("1.23"), Some(dec!(1.23)));
        assert_eq!(parse_decimal(" 0,45% "), Some(dec!(0.45)));
        assert_eq!(parse_decimal("1.234,56"), Some(dec!(1234.56)));
        assert_eq!(parse_decimal("1,234.56"), Some(dec!(1234.56)));
        assert_eq!(parse_decimal("\"0,87\""), Some(dec!(0.87)));
        assert_eq!(parse_decimal("0"), Some(Decimal::ZERO));
    }

    #[test]
    fn test_parse_decimal_unavailable() {
        assert_eq!(parse_decimal(""), None);
        assert_eq!(parse_decimal("   "), None);
        assert_eq!(parse_decimal("-"), None);
        assert_eq!(parse_decimal("—"), None);
        assert_eq!(parse_decimal("n/d"), None);
        assert_eq!(parse_decimal("%"), None);
    }

    #[test]
    fn test_parse_amount_thousands() {
        assert_eq!(parse_amount("1.000"), Some(dec!(1000)));
        assert_eq!(parse_amount("1.000.000"), Some(dec!(1000000)));
        assert_eq!(parse_amount("1.000,50"), Some(dec!(1000.50)));
        assert_eq!(parse_amount("1000.00"), Some(dec!(1000.00)));
        assert_eq!(parse_amount("1.5"), Some(dec!(1.5)));
        assert_eq!(parse_amount("1.0000"), Some(dec!(1.0000)));
        assert_eq!(parse_amount("1234.567"), Some(dec!(1234.567)));
        assert_eq!(parse_amount("abc"), None);
    }

    #[test]
    fn test_parse_year() {
        assert_eq!(parse_year("2024"), Some(2024));
        assert_eq!(parse_year(" 2024 "), Some(2024));
        assert_eq!(parse_year("2024*"), Some(2024));
        assert_eq!(parse_year("2024 (1)"), Some(2024));
        assert_eq!(parse_year("20245"), None);
        assert_eq!(parse_year("Ano"), None);
        assert_eq!(parse_year("Acumulado"), None);
        assert_eq!(parse_year(""), None);
    }
}
