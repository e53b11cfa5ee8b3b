// src/table/mod.rs

pub mod labels;
pub mod numbers;

use chrono::Month;
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use tracing::{debug, instrument, trace, warn};

use crate::error::{CorrectionError, Result};
use labels::{canonical_month, month_from_number, MONTH_LABELS, YEAR_LABEL};
use numbers::{parse_decimal, parse_year};

/// Columns a rate table needs: the year plus twelve months.
pub const REQUIRED_COLUMNS: usize = 13;

/// A table as it came off the page, before any interpretation.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RawGrid {
    /// Header cells, as the page labels them.
    pub headers: Vec<String>,
    /// Every data row below the header, one `String` per cell.
    pub rows: Vec<Vec<String>>,
}

impl RawGrid {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self { headers, rows }
    }

    pub fn column_count(&self) -> usize {
        self.headers.len()
    }

    pub fn ensure_columns(&self, min: usize) -> Result<()> {
        if self.column_count() < min {
            return Err(CorrectionError::Structural(format!(
                "expected at least {} columns, found {}",
                min,
                self.column_count()
            )));
        }
        Ok(())
    }

    /// Swap rows and columns. Ragged rows are padded with empty cells.
    pub fn transpose(&self) -> RawGrid {
        let mut all: Vec<&Vec<String>> = Vec::with_capacity(self.rows.len() + 1);
        all.push(&self.headers);
        all.extend(self.rows.iter());

        let width = all.iter().map(|r| r.len()).max().unwrap_or(0);
        let mut out: Vec<Vec<String>> = (0..width)
            .map(|col| {
                all.iter()
                    .map(|row| row.get(col).cloned().unwrap_or_default())
                    .collect()
            })
            .collect();

        if out.is_empty() {
            return RawGrid::default();
        }
        let headers = out.remove(0);
        RawGrid::new(headers, out)
    }
}

/// Monthly rates keyed by year. A `None` cell is a rate the page does not
/// publish (blank, dash, unparseable); `Some(0)` is a published zero.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RateTable {
    labels: Vec<String>,
    years: BTreeMap<i32, [Option<Decimal>; 12]>,
}

impl RateTable {
    /// Canonical column labels: `year` followed by the twelve months.
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn year(&self, year: i32) -> Option<&[Option<Decimal>; 12]> {
        self.years.get(&year)
    }

    pub fn contains_year(&self, year: i32) -> bool {
        self.years.contains_key(&year)
    }

    pub fn years(&self) -> impl Iterator<Item = i32> + '_ {
        self.years.keys().copied()
    }

    pub fn rate(&self, year: i32, month: Month) -> Option<Decimal> {
        self.year(year)
            .and_then(|row| row[month.number_from_month() as usize - 1])
    }

    pub fn is_empty(&self) -> bool {
        self.years.is_empty()
    }

    pub fn len(&self) -> usize {
        self.years.len()
    }
}

/// Coerce the header to canonical labels: column 0 becomes `year`, the
/// next twelve become the months in calendar order regardless of how the
/// page spelled them.
pub fn canonical_labels(headers: &[String]) -> Result<Vec<String>> {
    if headers.len() < REQUIRED_COLUMNS {
        return Err(CorrectionError::Structural(format!(
            "expected at least {} columns, found {}",
            REQUIRED_COLUMNS,
            headers.len()
        )));
    }

    let mut out = Vec::with_capacity(REQUIRED_COLUMNS);
    out.push(YEAR_LABEL.to_string());
    for (i, label) in MONTH_LABELS.iter().enumerate() {
        let raw = &headers[i + 1];
        match canonical_month(raw) {
            Some(m) if Some(m) != month_from_number(i as u32 + 1) => {
                warn!(column = i + 1, header = %raw, expected = %label, "header names a different month; using position");
            }
            None => trace!(column = i + 1, header = %raw, "unrecognised month header"),
            _ => {}
        }
        out.push((*label).to_string());
    }
    Ok(out)
}

/// Turn a raw grid into a [`RateTable`]. Rows without an integer year are
/// dropped; the first row for a given year wins.
#[instrument(level = "debug", skip(grid), fields(rows = grid.rows.len(), cols = grid.headers.len()))]
pub fn normalize(grid: &RawGrid) -> Result<RateTable> {
    let labels = canonical_labels(&grid.headers)?;

    let mut years = BTreeMap::new();
    let mut dropped = 0usize;
    for row in &grid.rows {
        let Some(year) = row.first().and_then(|c| parse_year(c)) else {
            dropped += 1;
            continue;
        };

        let mut cells = [None; 12];
        for (m, cell) in cells.iter_mut().enumerate() {
            *cell = row.get(m + 1).and_then(|c| parse_decimal(c));
        }

        if years.contains_key(&year) {
            warn!(year, "duplicate year row; keeping the first");
            continue;
        }
        years.insert(year, cells);
    }

    debug!(years = years.len(), dropped, "normalized rate table");
    Ok(RateTable { labels, years })
}
