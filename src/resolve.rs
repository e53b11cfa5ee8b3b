// src/resolve.rs

use chrono::{Datelike, Month, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::error::{CorrectionError, Result};
use crate::table::labels::month_label;
use crate::table::RateTable;

/// Whether a cumulative sum counts the reference month itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StartPolicy {
    #[default]
    Inclusive,
    Exclusive,
}

impl std::str::FromStr for StartPolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "inclusive" => Ok(StartPolicy::Inclusive),
            "exclusive" => Ok(StartPolicy::Exclusive),
            other => Err(format!(
                "unknown start policy {other:?} (expected inclusive or exclusive)"
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum LookupMode {
    /// The rate published for exactly the reference month.
    SingleMonth,
    /// Sum of monthly rates from the reference month to the end of its
    /// year, plus `surcharge` percentage points.
    CumulativeFromMonth {
        start: StartPolicy,
        surcharge: Decimal,
    },
    /// Like `CumulativeFromMonth`, carrying on into later years.
    CumulativeMultiYear {
        start: StartPolicy,
        surcharge: Decimal,
    },
}

/// Why accumulation stopped where it did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    SingleCell,
    EndOfYear,
    Unavailable,
    CurrentMonth,
    EndOfTable,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContributingRate {
    pub year: i32,
    pub month: u32,
    pub rate: Decimal,
}

/// A resolved rate and the cells it came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Resolution {
    /// Percentage to apply, surcharge included.
    pub rate: Decimal,
    pub surcharge: Decimal,
    pub months: Vec<ContributingRate>,
    pub stop: StopReason,
}

fn unavailable_year(year: i32) -> CorrectionError {
    CorrectionError::DataUnavailable(format!("no rates published for {year}"))
}

fn overflow() -> CorrectionError {
    CorrectionError::InvalidInput("accumulated rate is out of range".into())
}

fn next_month(year: i32, month: u32) -> (i32, u32) {
    if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    }
}

/// Resolve the rate for `(year, month)` under `mode`. `today` bounds the
/// cumulative modes: no month after today's month is ever summed.
#[instrument(level = "debug", skip(table, mode), fields(mode = ?mode))]
pub fn resolve(
    table: &RateTable,
    year: i32,
    month: Month,
    mode: &LookupMode,
    today: NaiveDate,
) -> Result<Resolution> {
    match *mode {
        LookupMode::SingleMonth => single_month(table, year, month),
        LookupMode::CumulativeFromMonth { start, surcharge } => {
            cumulative(table, year, month, start, surcharge, false, today)
        }
        LookupMode::CumulativeMultiYear { start, surcharge } => {
            cumulative(table, year, month, start, surcharge, true, today)
        }
    }
}

fn single_month(table: &RateTable, year: i32, month: Month) -> Result<Resolution> {
    let row = table.year(year).ok_or_else(|| unavailable_year(year))?;
    let m = month.number_from_month();
    let rate = row[m as usize - 1].ok_or_else(|| {
        CorrectionError::DataUnavailable(format!(
            "no rate published for {}/{}",
            month_label(month),
            year
        ))
    })?;

    Ok(Resolution {
        rate,
        surcharge: Decimal::ZERO,
        months: vec![ContributingRate {
            year,
            month: m,
            rate,
        }],
        stop: StopReason::SingleCell,
    })
}

fn cumulative(
    table: &RateTable,
    year: i32,
    month: Month,
    start: StartPolicy,
    surcharge: Decimal,
    multi_year: bool,
    today: NaiveDate,
) -> Result<Resolution> {
    if !table.contains_year(year) {
        return Err(unavailable_year(year));
    }

    let limit = (today.year(), today.month());
    let (mut y, mut m) = match start {
        StartPolicy::Inclusive => (year, month.number_from_month()),
        StartPolicy::Exclusive => next_month(year, month.number_from_month()),
    };

    let mut months = Vec::new();
    let mut sum = Decimal::ZERO;
    let stop = loop {
        if y != year && !multi_year {
            break StopReason::EndOfYear;
        }
        if (y, m) > limit {
            break StopReason::CurrentMonth;
        }
        let Some(row) = table.year(y) else {
            break StopReason::EndOfTable;
        };
        let Some(rate) = row[m as usize - 1] else {
            break StopReason::Unavailable;
        };
        sum = sum.checked_add(rate).ok_or_else(overflow)?;
        months.push(ContributingRate {
            year: y,
            month: m,
            rate,
        });
        (y, m) = next_month(y, m);
    };

    if months.is_empty() && start == StartPolicy::Inclusive {
        return Err(CorrectionError::DataUnavailable(format!(
            "no rate published for {}/{}",
            month_label(month),
            year
        )));
    }

    debug!(months = months.len(), %sum, %surcharge, ?stop, "accumulated rates");
    Ok(Resolution {
        rate: sum.checked_add(surcharge).ok_or_else(overflow)?,
        surcharge,
        months,
        stop,
    })
}
