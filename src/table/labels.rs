// src/table/labels.rs

use chrono::Month;

/// Canonical column label for the year column.
pub const YEAR_LABEL: &str = "year";

/// Canonical month labels, calendar order.
pub const MONTH_LABELS: [&str; 12] = [
    "Jan", "Fev", "Mar", "Abr", "Mai", "Jun", "Jul", "Ago", "Set", "Out", "Nov", "Dez",
];

const PT_NAMES: [&str; 12] = [
    "janeiro", "fevereiro", "marco", "abril", "maio", "junho", "julho", "agosto", "setembro",
    "outubro", "novembro", "dezembro",
];

const EN_NAMES: [&str; 12] = [
    "january",
    "february",
    "march",
    "april",
    "may",
    "june",
    "july",
    "august",
    "september",
    "october",
    "november",
    "december",
];

pub fn month_label(month: Month) -> &'static str {
    MONTH_LABELS[month.number_from_month() as usize - 1]
}

/// Month from its 1-based number.
pub fn month_from_number(n: u32) -> Option<Month> {
    u8::try_from(n).ok().and_then(|n| Month::try_from(n).ok())
}

/// Replace accented Latin letters with their base letter.
pub fn strip_diacritics(s: &str) -> String {
    s.chars()
        .map(|c| match c {
            'á' | 'à' | 'â' | 'ã' | 'ä' => 'a',
            'Á' | 'À' | 'Â' | 'Ã' | 'Ä' => 'A',
            'é' | 'è' | 'ê' | 'ë' => 'e',
            'É' | 'È' | 'Ê' | 'Ë' => 'E',
            'í' | 'ì' | 'î' | 'ï' => 'i',
            'Í' | 'Ì' | 'Î' | 'Ï' => 'I',
            'ó' | 'ò' | 'ô' | 'õ' | 'ö' => 'o',
            'Ó' | 'Ò' | 'Ô' | 'Õ' | 'Ö' => 'O',
            'ú' | 'ù' | 'û' | 'ü' => 'u',
            'Ú' | 'Ù' | 'Û' | 'Ü' => 'U',
            'ç' => 'c',
            'Ç' => 'C',
            'ñ' => 'n',
            'Ñ' => 'N',
            other => other,
        })
        .collect()
}

/// Lowercased, accent-free, whitespace-collapsed form used for every
/// header comparison.
pub fn fold(s: &str) -> String {
    strip_diacritics(s)
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Recognise a month from a raw header cell: Portuguese or English, full
/// name or abbreviation of at least three letters, any case, with or
/// without accents, surrounding whitespace or a trailing dot.
pub fn canonical_month(raw: &str) -> Option<Month> {
    let folded = fold(raw);
    let word = folded.trim_end_matches('.').trim();
    if word.len() < 3 || !word.chars().all(|c| c.is_ascii_alphabetic()) {
        return None;
    }
    (0..12)
        .find(|&i| PT_NAMES[i].starts_with(word) || EN_NAMES[i].starts_with(word))
        .and_then(|i| month_from_number(i as u32 + 1))
}
