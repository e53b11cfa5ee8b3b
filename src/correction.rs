// src/correction.rs

use chrono::{Datelike, Month, NaiveDate};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{info, instrument, warn};

use crate::error::{CorrectionError, Result};
use crate::fetch::{extract_table, TableSelection, TableSource};
use crate::resolve::{resolve, LookupMode, Resolution};
use crate::table::labels::{month_from_number, month_label};
use crate::table::{normalize, RateTable, RawGrid};

/// Earliest reference year accepted.
pub const MIN_YEAR: i32 = 2000;

/// An amount to correct and the month it refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CorrectionRequest {
    base_amount: Decimal,
    reference_year: i32,
    reference_month: Month,
}

impl CorrectionRequest {
    /// Validate and build a request. `today` rejects references after the
    /// current month.
    pub fn new(base_amount: Decimal, year: i32, month: u32, today: NaiveDate) -> Result<Self> {
        if base_amount <= Decimal::ZERO {
            return Err(CorrectionError::InvalidInput(format!(
                "amount must be greater than zero (got {base_amount})"
            )));
        }
        let reference_month = month_from_number(month).ok_or_else(|| {
            CorrectionError::InvalidInput(format!("month must be between 1 and 12 (got {month})"))
        })?;
        if year < MIN_YEAR {
            return Err(CorrectionError::InvalidInput(format!(
                "reference year must be {MIN_YEAR} or later (got {year})"
            )));
        }
        if (year, month) > (today.year(), today.month()) {
            return Err(CorrectionError::InvalidInput(format!(
                "reference {month:02}/{year} is in the future"
            )));
        }
        Ok(Self {
            base_amount,
            reference_year: year,
            reference_month,
        })
    }

    pub fn base_amount(&self) -> Decimal {
        self.base_amount
    }

    pub fn reference_year(&self) -> i32 {
        self.reference_year
    }

    pub fn reference_month(&self) -> Month {
        self.reference_month
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CorrectionOptions {
    pub mode: LookupMode,
    /// Treat a resolved rate of exactly zero as missing data.
    pub reject_zero_rate: bool,
}

impl Default for CorrectionOptions {
    fn default() -> Self {
        Self {
            mode: LookupMode::SingleMonth,
            reject_zero_rate: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CorrectionResult {
    pub base_amount: Decimal,
    pub reference_year: i32,
    pub reference_month: u32,
    pub resolved_rate_percent: Decimal,
    /// Unrounded; round only when presenting.
    pub corrected_amount: Decimal,
    pub resolution: Resolution,
}

/// `base * (1 + rate/100)`, no intermediate rounding. Fails instead of
/// overflowing the 96-bit mantissa.
pub fn apply_rate(base: Decimal, rate_percent: Decimal) -> Result<Decimal> {
    rate_percent
        .checked_div(Decimal::ONE_HUNDRED)
        .and_then(|r| Decimal::ONE.checked_add(r))
        .and_then(|factor| base.checked_mul(factor))
        .ok_or_else(|| {
            CorrectionError::InvalidInput(format!(
                "corrected amount for {base} at {rate_percent}% is out of range"
            ))
        })
}

/// Resolve and apply against an already normalized table.
pub fn correct_table(
    table: &RateTable,
    request: &CorrectionRequest,
    options: &CorrectionOptions,
    today: NaiveDate,
) -> Result<CorrectionResult> {
    let resolution = resolve(
        table,
        request.reference_year,
        request.reference_month,
        &options.mode,
        today,
    )?;

    if options.reject_zero_rate && resolution.rate.is_zero() {
        return Err(CorrectionError::DataUnavailable(format!(
            "resolved rate for {}/{} is zero",
            month_label(request.reference_month),
            request.reference_year
        )));
    }

    let corrected_amount = apply_rate(request.base_amount, resolution.rate)?;
    Ok(CorrectionResult {
        base_amount: request.base_amount,
        reference_year: request.reference_year,
        reference_month: request.reference_month.number_from_month(),
        resolved_rate_percent: resolution.rate,
        corrected_amount,
        resolution,
    })
}

/// Normalize `grid`, then resolve and apply. Pure.
pub fn correct(
    grid: &RawGrid,
    request: &CorrectionRequest,
    options: &CorrectionOptions,
    today: NaiveDate,
) -> Result<CorrectionResult> {
    let table = normalize(grid)?;
    if table.is_empty() {
        return Err(CorrectionError::Structural(
            "no row of the table starts with a year".into(),
        ));
    }
    correct_table(&table, request, options, today)
}

/// Fetch, extract and correct, one request at a time.
pub struct Corrector<S> {
    source: S,
    selection: TableSelection,
    options: CorrectionOptions,
}

impl<S: TableSource> Corrector<S> {
    pub fn new(source: S, selection: TableSelection, options: CorrectionOptions) -> Self {
        Self {
            source,
            selection,
            options,
        }
    }

    /// The page is fetched fresh on every call and dropped afterwards.
    #[instrument(level = "info", skip(self, request), fields(source = %self.source.describe(), year = request.reference_year(), month = request.reference_month().number_from_month()))]
    pub async fn run(
        &self,
        request: &CorrectionRequest,
        today: NaiveDate,
    ) -> Result<CorrectionResult> {
        let html = self.source.fetch_html().await?;
        let grid = extract_table(&html, &self.selection)?;
        match correct(&grid, request, &self.options, today) {
            Ok(result) => {
                info!(
                    rate = %result.resolved_rate_percent,
                    months = result.resolution.months.len(),
                    "correction computed"
                );
                Ok(result)
            }
            Err(e) => {
                warn!(kind = ?e.kind(), error = %e, "correction failed");
                Err(e)
            }
        }
    }
}
