//! Persisted history aggregate and its merge rules.
//!
//! The store owns one append-only series per instrument. Every mutation goes
//! through [`Store::merge`] or [`Store::mark_unavailable`], and after either
//! call each series is strictly increasing by date with no repeated dates.

use crate::domain::error::NavsyncError;
use crate::domain::instrument::Instrument;
use crate::domain::observation::Observation;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub date: NaiveDate,
    pub price: Decimal,
    pub change_percent: Option<Decimal>,
}

impl From<&Observation> for HistoryEntry {
    fn from(obs: &Observation) -> Self {
        Self {
            date: obs.date,
            price: obs.price,
            change_percent: obs.change_percent,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstrumentRecord {
    pub name: String,
    #[serde(default)]
    pub history: Vec<HistoryEntry>,
}

impl InstrumentRecord {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            history: Vec::new(),
        }
    }

    pub fn has_date(&self, date: NaiveDate) -> bool {
        self.history
            .binary_search_by_key(&date, |e| e.date)
            .is_ok()
    }

    pub fn latest(&self) -> Option<&HistoryEntry> {
        self.history.last()
    }

    pub fn first(&self) -> Option<&HistoryEntry> {
        self.history.first()
    }

    fn insert(&mut self, entry: HistoryEntry) {
        self.history.push(entry);
        self.history.sort_by_key(|e| e.date);
    }

    /// Drop the oldest entries until at most `cap` remain.
    fn retain_latest(&mut self, cap: usize) -> usize {
        let excess = self.history.len().saturating_sub(cap);
        if excess > 0 {
            self.history.drain(..excess);
        }
        excess
    }
}

/// Rule deciding whether an observation becomes a new history entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MergePolicy {
    /// Append when the instrument has no entry for the date.
    #[default]
    DateKeyed,
    /// As `DateKeyed`, and also skip when the price equals the most recent
    /// stored price. An unchanged latest price means the source has not
    /// refreshed yet.
    LatestPrice,
}

impl std::str::FromStr for MergePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "date" | "date_keyed" => Ok(MergePolicy::DateKeyed),
            "latest_price" | "price" => Ok(MergePolicy::LatestPrice),
            other => Err(format!(
                "unknown merge policy '{other}' (expected date or latest_price)"
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MergeOptions {
    pub policy: MergePolicy,
    /// Maximum entries kept per instrument; `None` keeps everything.
    pub retention: Option<usize>,
}

/// Per-instrument result of one merge call.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MergeOutcome {
    pub added: Vec<String>,
    pub already_present: Vec<String>,
    pub unchanged_price: Vec<String>,
    pub unknown: Vec<String>,
    pub evicted: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Store {
    #[serde(default)]
    pub instruments: BTreeMap<String, InstrumentRecord>,
    #[serde(default)]
    pub unavailable_dates: BTreeSet<NaiveDate>,
    #[serde(default)]
    pub last_synced_at: Option<DateTime<Utc>>,
    /// Newest as-of date the source has reported for an accepted batch.
    #[serde(default)]
    pub last_reported_as_of: Option<NaiveDate>,
}

impl Store {
    /// A fresh store with an empty record for each instrument.
    pub fn empty(instruments: &[Instrument]) -> Self {
        let mut store = Store::default();
        store.ensure_instruments(instruments);
        store
    }

    /// Add records for newly configured instruments and refresh display names.
    ///
    /// Records for instruments that are no longer configured are left alone.
    pub fn ensure_instruments(&mut self, instruments: &[Instrument]) {
        for instrument in instruments {
            let record = self
                .instruments
                .entry(instrument.id.clone())
                .or_insert_with(|| InstrumentRecord::new(instrument.name.clone()));
            if record.name != instrument.name {
                record.name = instrument.name.clone();
            }
        }
    }

    pub fn record(&self, id: &str) -> Option<&InstrumentRecord> {
        self.instruments.get(id)
    }

    pub fn has_entry(&self, id: &str, date: NaiveDate) -> bool {
        self.instruments
            .get(id)
            .is_some_and(|record| record.has_date(date))
    }

    pub fn is_unavailable(&self, date: NaiveDate) -> bool {
        self.unavailable_dates.contains(&date)
    }

    /// Merge observations resolved to `date`.
    ///
    /// Each observation is rekeyed to `date`. Observations for instruments
    /// without a record are reported as unknown and dropped.
    pub fn merge(
        &mut self,
        date: NaiveDate,
        observations: &[Observation],
        options: MergeOptions,
    ) -> MergeOutcome {
        let mut outcome = MergeOutcome::default();

        for obs in observations {
            let Some(record) = self.instruments.get_mut(&obs.instrument_id) else {
                outcome.unknown.push(obs.instrument_id.clone());
                continue;
            };

            if record.has_date(date) {
                outcome.already_present.push(obs.instrument_id.clone());
                continue;
            }

            if options.policy == MergePolicy::LatestPrice
                && record.latest().is_some_and(|last| last.price == obs.price)
            {
                outcome.unchanged_price.push(obs.instrument_id.clone());
                continue;
            }

            record.insert(HistoryEntry::from(&obs.rekeyed(date)));
            if let Some(cap) = options.retention {
                outcome.evicted += record.retain_latest(cap);
            }

            // An entry older than a full retained series is evicted at once.
            if record.has_date(date) {
                outcome.added.push(obs.instrument_id.clone());
            }
        }

        outcome
    }

    pub fn mark_unavailable<I>(&mut self, dates: I) -> usize
    where
        I: IntoIterator<Item = NaiveDate>,
    {
        let before = self.unavailable_dates.len();
        self.unavailable_dates.extend(dates);
        self.unavailable_dates.len() - before
    }

    /// Check the ordering and uniqueness invariants of every series.
    pub fn validate(&self) -> Result<(), NavsyncError> {
        for (id, record) in &self.instruments {
            if let Some(pair) = record.history.windows(2).find(|w| w[0].date >= w[1].date) {
                return Err(NavsyncError::HistoryOrder {
                    instrument: id.clone(),
                    date: pair[1].date,
                });
            }
        }
        Ok(())
    }

    pub fn entry_count(&self) -> usize {
        self.instruments.values().map(|r| r.history.len()).sum()
    }
}
