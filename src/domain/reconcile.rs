//! Reconciliation of a fetched batch against the requested date.
//!
//! Sources do not always answer the question asked: a holiday request comes
//! back with the previous session, a stale cache serves last week, and some
//! pages carry no date at all. [`classify`] turns the requested/reported pair
//! into a verdict, and [`reconcile`] applies it to a batch together with the
//! run's [`RunLedger`] so that two requests resolving to the same session are
//! merged once.

use crate::domain::observation::Observation;
use crate::ports::quote_source::QuoteBatch;
use chrono::NaiveDate;
use std::collections::BTreeSet;

/// Default tolerance between requested and reported dates.
pub const DEFAULT_MAX_OFFSET_DAYS: i64 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// The source reported the requested date.
    Accepted,
    /// The source rolled to a nearby date. The requested date has no data of
    /// its own; the reported date is processed normally.
    Substituted { reported: NaiveDate },
    /// The reported date is too far from the request to be trusted.
    OutOfRange { reported: NaiveDate },
    /// The source gave no as-of date.
    Unresolved,
}

pub fn classify(
    requested: NaiveDate,
    reported: Option<NaiveDate>,
    max_offset_days: i64,
) -> Classification {
    let Some(reported) = reported else {
        return Classification::Unresolved;
    };

    let offset = (reported - requested).num_days().abs();
    if offset > max_offset_days {
        Classification::OutOfRange { reported }
    } else if reported != requested {
        Classification::Substituted { reported }
    } else {
        Classification::Accepted
    }
}

/// Dates accepted so far in the current run.
#[derive(Debug, Default, Clone)]
pub struct RunLedger {
    accepted: BTreeSet<NaiveDate>,
}

impl RunLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.accepted.contains(&date)
    }

    /// Returns `false` when the date was already accepted.
    pub fn record(&mut self, date: NaiveDate) -> bool {
        self.accepted.insert(date)
    }

    pub fn len(&self) -> usize {
        self.accepted.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accepted.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcceptedBatch {
    pub date: NaiveDate,
    pub observations: Vec<Observation>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciliation {
    pub classification: Classification,
    /// Requested date to record as unavailable.
    pub mark_unavailable: Option<NaiveDate>,
    pub accepted: Option<AcceptedBatch>,
    /// Resolved date that an earlier fetch in this run already accepted.
    pub duplicate_of: Option<NaiveDate>,
}

impl Reconciliation {
    fn discard(classification: Classification, mark_unavailable: Option<NaiveDate>) -> Self {
        Self {
            classification,
            mark_unavailable,
            accepted: None,
            duplicate_of: None,
        }
    }
}

/// Reconcile a batch fetched for `requested`.
pub fn reconcile(
    requested: NaiveDate,
    batch: &QuoteBatch,
    ledger: &mut RunLedger,
    max_offset_days: i64,
) -> Reconciliation {
    let classification = classify(requested, batch.reported_as_of, max_offset_days);

    let (resolved, mark_unavailable) = match classification {
        Classification::Unresolved => return Reconciliation::discard(classification, None),
        Classification::OutOfRange { .. } => {
            return Reconciliation::discard(classification, Some(requested));
        }
        Classification::Substituted { reported } => (reported, Some(requested)),
        Classification::Accepted => (requested, None),
    };

    accept_into_ledger(classification, resolved, mark_unavailable, batch, ledger)
}

/// Reconcile a batch fetched without a target date.
pub fn reconcile_latest(batch: &QuoteBatch, ledger: &mut RunLedger) -> Reconciliation {
    match batch.reported_as_of {
        None => Reconciliation::discard(Classification::Unresolved, None),
        Some(reported) => {
            accept_into_ledger(Classification::Accepted, reported, None, batch, ledger)
        }
    }
}

fn accept_into_ledger(
    classification: Classification,
    resolved: NaiveDate,
    mark_unavailable: Option<NaiveDate>,
    batch: &QuoteBatch,
    ledger: &mut RunLedger,
) -> Reconciliation {
    if !ledger.record(resolved) {
        return Reconciliation {
            classification,
            mark_unavailable,
            accepted: None,
            duplicate_of: Some(resolved),
        };
    }

    let observations = batch
        .observations
        .iter()
        .map(|obs| obs.rekeyed(resolved))
        .collect();

    Reconciliation {
        classification,
        mark_unavailable,
        accepted: Some(AcceptedBatch {
            date: resolved,
            observations,
        }),
        duplicate_of: None,
    }
}
