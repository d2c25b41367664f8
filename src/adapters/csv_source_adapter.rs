//! CSV snapshot quote source.
//!
//! Reads a directory of `YYYY-MM-DD.csv` files, one per as-of date, each with
//! a `code,price,change_percent` header. A request for a date is answered the
//! way a quote page answers it: with the newest snapshot on or before that
//! date, or the oldest one when nothing is that old.

use crate::domain::error::SourceError;
use crate::domain::observation::Observation;
use crate::ports::quote_source::{QuoteBatch, QuoteSource};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

pub struct CsvSourceAdapter {
    base_path: PathBuf,
}

impl CsvSourceAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn snapshot_path(&self, date: NaiveDate) -> PathBuf {
        self.base_path.join(format!("{}.csv", date.format("%Y-%m-%d")))
    }

    /// Dates of all snapshot files, ascending.
    pub fn snapshot_dates(&self) -> Result<Vec<NaiveDate>, SourceError> {
        let entries = fs::read_dir(&self.base_path).map_err(|e| {
            SourceError::unavailable(format!(
                "failed to read directory {}: {}",
                self.base_path.display(),
                e
            ))
        })?;

        let mut dates = Vec::new();
        for entry in entries {
            let entry = entry
                .map_err(|e| SourceError::unavailable(format!("directory entry error: {}", e)))?;

            let name = entry.file_name();
            let name_str = name.to_string_lossy();

            if let Some(stem) = name_str.strip_suffix(".csv") {
                if let Ok(date) = NaiveDate::parse_from_str(stem, "%Y-%m-%d") {
                    dates.push(date);
                }
            }
        }

        dates.sort();
        Ok(dates)
    }

    fn resolve(&self, target: Option<NaiveDate>) -> Result<NaiveDate, SourceError> {
        let dates = self.snapshot_dates()?;
        let Some(&oldest) = dates.first() else {
            return Err(SourceError::unavailable(format!(
                "no snapshots in {}",
                self.base_path.display()
            )));
        };

        let resolved = match target {
            None => dates.last().copied(),
            Some(t) => dates.iter().rev().find(|d| **d <= t).copied(),
        };
        Ok(resolved.unwrap_or(oldest))
    }

    fn read_snapshot(
        &self,
        path: &Path,
        as_of: NaiveDate,
        wanted: &HashSet<String>,
    ) -> Result<Vec<Observation>, SourceError> {
        let content = fs::read_to_string(path).map_err(|e| {
            SourceError::unavailable(format!("failed to read {}: {}", path.display(), e))
        })?;

        let mut rdr = csv::Reader::from_reader(content.as_bytes());
        let mut observations = Vec::new();

        for result in rdr.records() {
            let record = result
                .map_err(|e| SourceError::unavailable(format!("CSV parse error: {}", e)))?;

            let code = record
                .get(0)
                .ok_or_else(|| SourceError::unavailable("missing code column"))?
                .trim()
                .to_uppercase();
            if !wanted.contains(&code) {
                continue;
            }

            let price = parse_decimal(
                record
                    .get(1)
                    .ok_or_else(|| SourceError::unavailable("missing price column"))?,
            )
            .map_err(|e| SourceError::unavailable(format!("invalid price for {}: {}", code, e)))?;

            let change_percent = match record.get(2).map(str::trim) {
                None | Some("") => None,
                Some(raw) => Some(parse_decimal(raw).map_err(|e| {
                    SourceError::unavailable(format!("invalid change for {}: {}", code, e))
                })?),
            };

            observations.push(Observation::new(code, price, change_percent, as_of));
        }

        Ok(observations)
    }
}

/// Parse a quoted number the way pages print them: `$1,234.5678`, `-0.12%`.
fn parse_decimal(raw: &str) -> Result<Decimal, rust_decimal::Error> {
    let cleaned: String = raw
        .trim()
        .chars()
        .filter(|c| !matches!(c, '$' | ',' | '%' | '+'))
        .collect();
    Decimal::from_str(&cleaned)
}

impl QuoteSource for CsvSourceAdapter {
    fn fetch(
        &self,
        target: Option<NaiveDate>,
        instrument_ids: &[String],
    ) -> Result<QuoteBatch, SourceError> {
        let as_of = self.resolve(target)?;
        let wanted: HashSet<String> = instrument_ids.iter().map(|id| id.to_uppercase()).collect();
        let observations = self.read_snapshot(&self.snapshot_path(as_of), as_of, &wanted)?;

        if observations.is_empty() {
            return Err(SourceError::Empty);
        }

        Ok(QuoteBatch {
            observations,
            reported_as_of: Some(as_of),
        })
    }

    fn name(&self) -> &str {
        "csv snapshots"
    }
}
