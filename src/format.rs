// src/format.rs

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Locale {
    /// `R$ 1.234,56`, `12,34%`
    #[default]
    PtBr,
    /// `$1,234.56`, `12.34%`
    EnUs,
}

impl Locale {
    fn separators(self) -> (char, char) {
        match self {
            Locale::PtBr => ('.', ','),
            Locale::EnUs => (',', '.'),
        }
    }
}

impl FromStr for Locale {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "pt-br" | "pt" => Ok(Locale::PtBr),
            "en-us" | "en" => Ok(Locale::EnUs),
            other => Err(format!("unsupported locale {other:?} (expected pt-BR or en-US)")),
        }
    }
}

/// Round to cents and render with the locale's separators, no symbol.
fn two_places(val: Decimal, locale: Locale) -> String {
    let (thousands, decimal) = locale.separators();
    let rounded = val.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    let negative = rounded.is_sign_negative() && !rounded.is_zero();
    let text = format!("{:.2}", rounded.abs());
    let (int_part, dec_part) = text.split_once('.').unwrap_or((text.as_str(), "00"));

    let mut grouped = String::new();
    for (i, c) in int_part.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            grouped.push(thousands);
        }
        grouped.push(c);
    }
    let grouped: String = grouped.chars().rev().collect();

    format!(
        "{}{}{}{}",
        if negative { "-" } else { "" },
        grouped,
        decimal,
        dec_part
    )
}

/// Format a money amount: `R$ 1.234,56` or `$1,234.56`.
pub fn format_currency(amount: Decimal, locale: Locale) -> String {
    let body = two_places(amount, locale);
    let (sign, digits) = match body.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", body.as_str()),
    };
    match locale {
        Locale::PtBr => format!("{sign}R$ {digits}"),
        Locale::EnUs => format!("{sign}${digits}"),
    }
}

/// Format a percentage already expressed in percent: `12,34%`.
pub fn format_percent(rate: Decimal, locale: Locale) -> String {
    format!("{}%", two_places(rate, locale))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_currency_pt_br() {
        assert_eq!(format_currency(dec!(1234.56), Locale::PtBr), "R$ 1.234,56");
        assert_eq!(format_currency(dec!(1038), Locale::PtBr), "R$ 1.038,00");
        assert_eq!(format_currency(dec!(0), Locale::PtBr), "R$ 0,00");
        assert_eq!(format_currency(dec!(-500), Locale::PtBr), "-R$ 500,00");
        assert_eq!(format_currency(dec!(1000000.995), Locale::PtBr), "R$ 1.000.001,00");
    }

    #[test]
    fn test_currency_en_us() {
        assert_eq!(format_currency(dec!(1234.56), Locale::EnUs), "$1,234.56");
        assert_eq!(format_currency(dec!(42.1), Locale::EnUs), "$42.10");
        assert_eq!(format_currency(dec!(-0.001), Locale::EnUs), "$0.00");
    }

    #[test]
    fn test_percent() {
        assert_eq!(format_percent(dec!(12.345), Locale::PtBr), "12,35%");
        assert_eq!(format_percent(dec!(3.8), Locale::EnUs), "3.80%");
        assert_eq!(format_percent(dec!(0.004), Locale::PtBr), "0,00%");
    }

    #[test]
    fn test_locale_from_str() {
        assert_eq!("pt-BR".parse::<Locale>(), Ok(Locale::PtBr));
        assert_eq!("en_US".parse::<Locale>(), Ok(Locale::EnUs));
        assert!("fr-FR".parse::<Locale>().is_err());
    }
}
