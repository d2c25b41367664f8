//! Gap detection: which window dates still need a fetch.

use crate::domain::store::Store;
use crate::domain::sync_config::SyncMode;
use chrono::NaiveDate;

/// Dates in `window` that still need fetching, in window order.
///
/// A date counts as present only when every tracked instrument has an entry
/// for it. Dates already known to be unavailable are never returned, except in
/// backfill mode, which returns the whole window.
pub fn missing_dates(
    store: &Store,
    window: &[NaiveDate],
    tracked: &[String],
    mode: SyncMode,
) -> Vec<NaiveDate> {
    if mode == SyncMode::Backfill {
        return window.to_vec();
    }

    window
        .iter()
        .copied()
        .filter(|date| !store.is_unavailable(*date))
        .filter(|date| !is_fully_covered(store, *date, tracked))
        .collect()
}

/// Tracked instruments with no entry for `date`.
pub fn uncovered_instruments(store: &Store, date: NaiveDate, tracked: &[String]) -> Vec<String> {
    tracked
        .iter()
        .filter(|id| !store.has_entry(id, date))
        .cloned()
        .collect()
}

fn is_fully_covered(store: &Store, date: NaiveDate, tracked: &[String]) -> bool {
    !tracked.is_empty() && tracked.iter().all(|id| store.has_entry(id, date))
}
