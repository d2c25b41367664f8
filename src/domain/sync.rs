//! Sync orchestrator.
//!
//! One run walks `Init → ComputeGaps → FetchLoop ⇄ Reconcile → Commit → Done`.
//! Per-date source failures are recorded and skipped; an unreadable store or a
//! run in which no fetch produced data aborts before anything is written.

use crate::domain::calendar::business_days;
use crate::domain::error::{NavsyncError, SourceError};
use crate::domain::gaps::{missing_dates, uncovered_instruments};
use crate::domain::reconcile::{
    reconcile, reconcile_latest, AcceptedBatch, Classification, Reconciliation, RunLedger,
};
use crate::domain::store::Store;
use crate::domain::sync_config::{SyncConfig, SyncMode};
use crate::ports::quote_source::{QuoteBatch, QuoteSource};
use crate::ports::store_port::StorePort;
use chrono::{DateTime, Local, NaiveDate, Utc};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt;
use std::time::Instant;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    Init,
    ComputeGaps,
    FetchLoop,
    Reconcile,
    Commit,
    Done,
}

impl fmt::Display for SyncPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SyncPhase::Init => "init",
            SyncPhase::ComputeGaps => "compute-gaps",
            SyncPhase::FetchLoop => "fetch-loop",
            SyncPhase::Reconcile => "reconcile",
            SyncPhase::Commit => "commit",
            SyncPhase::Done => "done",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    SourceUnavailable(String),
    SourceEmpty,
    OutOfRange { reported: NaiveDate },
    Substituted { reported: NaiveDate },
    Unresolved,
    Duplicate { resolved: NaiveDate },
    Deadline,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::SourceUnavailable(reason) => write!(f, "source unavailable ({reason})"),
            SkipReason::SourceEmpty => write!(f, "no rows for tracked instruments"),
            SkipReason::OutOfRange { reported } => {
                write!(f, "source reported {reported}, out of range")
            }
            SkipReason::Substituted { reported } => write!(f, "source substituted {reported}"),
            SkipReason::Unresolved => write!(f, "source reported no as-of date"),
            SkipReason::Duplicate { resolved } => {
                write!(f, "{resolved} already fetched this run")
            }
            SkipReason::Deadline => write!(f, "run deadline reached"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedDate {
    pub date: NaiveDate,
    pub reason: SkipReason,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartialCoverage {
    pub date: NaiveDate,
    pub missing: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncSummary {
    pub mode: SyncMode,
    pub window: Vec<NaiveDate>,
    pub targets: Vec<NaiveDate>,
    /// Resolved dates whose batches were accepted, in fetch order.
    pub scraped: Vec<NaiveDate>,
    pub skipped: Vec<SkippedDate>,
    /// New entries per tracked instrument, zero included.
    pub added: BTreeMap<String, usize>,
    pub newly_unavailable: Vec<NaiveDate>,
    pub partial: Vec<PartialCoverage>,
    pub committed: bool,
    pub synced_at: Option<DateTime<Utc>>,
}

impl SyncSummary {
    fn new(mode: SyncMode, tracked: &[String]) -> Self {
        Self {
            mode,
            window: Vec::new(),
            targets: Vec::new(),
            scraped: Vec::new(),
            skipped: Vec::new(),
            added: tracked.iter().map(|id| (id.clone(), 0)).collect(),
            newly_unavailable: Vec::new(),
            partial: Vec::new(),
            committed: false,
            synced_at: None,
        }
    }

    pub fn total_added(&self) -> usize {
        self.added.values().sum()
    }

    fn skip(&mut self, date: NaiveDate, reason: SkipReason) {
        self.skipped.push(SkippedDate { date, reason });
    }
}

/// Accumulated results of the fetch loop, applied to the store at commit.
#[derive(Default)]
struct FetchState {
    ledger: RunLedger,
    accepted: Vec<AcceptedBatch>,
    unavailable: BTreeSet<NaiveDate>,
    attempted: usize,
    responded: usize,
}

pub struct Synchronizer<'a> {
    config: &'a SyncConfig,
    source: &'a dyn QuoteSource,
    store_port: &'a dyn StorePort,
    dry_run: bool,
}

impl<'a> Synchronizer<'a> {
    pub fn new(
        config: &'a SyncConfig,
        source: &'a dyn QuoteSource,
        store_port: &'a dyn StorePort,
    ) -> Self {
        Self {
            config,
            source,
            store_port,
            dry_run: false,
        }
    }

    /// Stop after gap detection: report the targets, fetch and write nothing.
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn run(&self) -> Result<SyncSummary, NavsyncError> {
        self.run_at(Local::now().date_naive(), Utc::now())
    }

    /// Run with an explicit calendar date and commit timestamp.
    pub fn run_at(&self, today: NaiveDate, now: DateTime<Utc>) -> Result<SyncSummary, NavsyncError> {
        let tracked = self.config.tracked_ids();
        let mut summary = SyncSummary::new(self.config.mode, &tracked);

        self.enter(SyncPhase::Init);
        let mut store = self.load_store()?;

        self.enter(SyncPhase::ComputeGaps);
        if self.config.mode != SyncMode::Latest {
            let size = self.window_size(&store, &tracked);
            summary.window = business_days(size, today);
            summary.targets = missing_dates(&store, &summary.window, &tracked, self.config.mode);
            info!(
                mode = %self.config.mode,
                window = summary.window.len(),
                targets = summary.targets.len(),
                "computed sync targets"
            );
        }

        if self.dry_run {
            self.enter(SyncPhase::Done);
            return Ok(summary);
        }

        self.enter(SyncPhase::FetchLoop);
        let state = match self.config.mode {
            SyncMode::Latest => self.fetch_latest(&tracked, &mut summary),
            SyncMode::Incremental | SyncMode::Backfill => {
                let targets = summary.targets.clone();
                self.fetch_targets(&targets, &tracked, &mut summary)
            }
        };

        if state.attempted > 0 && state.responded == 0 {
            warn!(attempted = state.attempted, "no fetch produced data, aborting run");
            return Err(NavsyncError::SourceExhausted {
                attempted: state.attempted,
            });
        }

        self.enter(SyncPhase::Commit);
        self.commit(&mut store, state, &tracked, now, &mut summary)?;

        self.enter(SyncPhase::Done);
        info!(
            scraped = summary.scraped.len(),
            skipped = summary.skipped.len(),
            added = summary.total_added(),
            "sync complete"
        );
        Ok(summary)
    }

    fn enter(&self, phase: SyncPhase) {
        debug!(%phase, "sync phase");
    }

    fn load_store(&self) -> Result<Store, NavsyncError> {
        let mut store = match self.store_port.load()? {
            Some(store) => {
                store.validate().map_err(|e| NavsyncError::StoreCorrupt {
                    path: self.store_port.location(),
                    reason: e.to_string(),
                })?;
                debug!(
                    entries = store.entry_count(),
                    unavailable = store.unavailable_dates.len(),
                    "loaded store"
                );
                store
            }
            None => {
                info!(location = %self.store_port.location(), "no store yet, starting empty");
                Store::default()
            }
        };
        store.ensure_instruments(&self.config.instruments);
        Ok(store)
    }

    fn window_size(&self, store: &Store, tracked: &[String]) -> usize {
        let bootstrapping = tracked
            .iter()
            .any(|id| store.record(id).is_none_or(|r| r.history.is_empty()));
        match self.config.bootstrap_window_size {
            Some(size) if bootstrapping => {
                info!(size, "tracked instrument without history, using bootstrap window");
                size
            }
            _ => self.config.window_size,
        }
    }

    fn fetch_targets(
        &self,
        targets: &[NaiveDate],
        tracked: &[String],
        summary: &mut SyncSummary,
    ) -> FetchState {
        let mut state = FetchState::default();
        // A timeout past the end of the clock means no deadline.
        let deadline = self
            .config
            .run_timeout
            .and_then(|t| Instant::now().checked_add(t));

        for (i, &date) in targets.iter().enumerate() {
            if deadline.is_some_and(|d| Instant::now() >= d) {
                warn!(remaining = targets.len() - i, "run deadline reached, skipping remaining dates");
                for &rest in &targets[i..] {
                    summary.skip(rest, SkipReason::Deadline);
                }
                break;
            }

            state.attempted += 1;
            let Some(batch) = self.fetch_one(Some(date), tracked, summary) else {
                continue;
            };

            self.enter(SyncPhase::Reconcile);
            let outcome = reconcile(date, &batch, &mut state.ledger, self.config.max_offset_days);
            // A batch without an as-of date tells us nothing about any date.
            if outcome.classification != Classification::Unresolved {
                state.responded += 1;
            }
            self.record(date, outcome, &mut state, summary);
        }

        state
    }

    fn fetch_latest(&self, tracked: &[String], summary: &mut SyncSummary) -> FetchState {
        let mut state = FetchState {
            attempted: 1,
            ..FetchState::default()
        };
        if let Some(batch) = self.fetch_one(None, tracked, summary) {
            let outcome = reconcile_latest(&batch, &mut state.ledger);
            if let Some(accepted) = outcome.accepted {
                info!(date = %accepted.date, rows = accepted.observations.len(), "accepted latest quotes");
                state.responded = 1;
                summary.scraped.push(accepted.date);
                state.accepted.push(accepted);
            } else {
                warn!("latest quotes carry no as-of date, discarding");
            }
        }
        state
    }

    /// One source call. `None` when the fetch produced nothing usable.
    fn fetch_one(
        &self,
        target: Option<NaiveDate>,
        tracked: &[String],
        summary: &mut SyncSummary,
    ) -> Option<QuoteBatch> {
        let label = target.map_or_else(|| "latest".to_string(), |d| d.to_string());
        debug!(source = self.source.name(), target = %label, "fetching quotes");

        let result = self
            .source
            .fetch(target, tracked)
            .and_then(|batch| self.normalize(batch));

        match result {
            Ok(batch) => Some(batch),
            Err(err) => {
                warn!(target = %label, error = %err, "fetch failed, continuing");
                if let Some(date) = target {
                    let reason = match err {
                        SourceError::Unavailable { reason } => SkipReason::SourceUnavailable(reason),
                        SourceError::Empty => SkipReason::SourceEmpty,
                    };
                    summary.skip(date, reason);
                }
                None
            }
        }
    }

    /// Keep tracked instruments only, first row per instrument, rounded to
    /// stored precision.
    fn normalize(&self, batch: QuoteBatch) -> Result<QuoteBatch, SourceError> {
        let mut seen = HashSet::new();
        let mut observations = Vec::with_capacity(batch.observations.len());

        for obs in &batch.observations {
            let Some(instrument) = self.config.instrument(&obs.instrument_id) else {
                debug!(instrument = %obs.instrument_id, "ignoring untracked instrument");
                continue;
            };
            if seen.insert(obs.instrument_id.clone()) {
                observations.push(instrument.normalize(obs));
            }
        }

        if observations.is_empty() {
            return Err(SourceError::Empty);
        }

        Ok(QuoteBatch {
            observations,
            reported_as_of: batch.reported_as_of,
        })
    }

    fn record(
        &self,
        requested: NaiveDate,
        outcome: Reconciliation,
        state: &mut FetchState,
        summary: &mut SyncSummary,
    ) {
        if let Some(date) = outcome.mark_unavailable {
            state.unavailable.insert(date);
        }

        match outcome.classification {
            Classification::Unresolved => {
                warn!(%requested, "source reported no as-of date, will retry next run");
                summary.skip(requested, SkipReason::Unresolved);
            }
            Classification::OutOfRange { reported } => {
                warn!(%requested, %reported, "reported date out of range, marking unavailable");
                summary.skip(requested, SkipReason::OutOfRange { reported });
            }
            Classification::Substituted { reported } => {
                info!(%requested, %reported, "source substituted date, marking requested unavailable");
                summary.skip(requested, SkipReason::Substituted { reported });
            }
            Classification::Accepted => {
                if let Some(resolved) = outcome.duplicate_of {
                    summary.skip(requested, SkipReason::Duplicate { resolved });
                }
            }
        }

        if let Some(resolved) = outcome.duplicate_of {
            debug!(%requested, %resolved, "resolved date already accepted this run");
        }

        if let Some(accepted) = outcome.accepted {
            info!(date = %accepted.date, rows = accepted.observations.len(), "accepted quotes");
            summary.scraped.push(accepted.date);
            state.accepted.push(accepted);
        }
    }

    fn commit(
        &self,
        store: &mut Store,
        mut state: FetchState,
        tracked: &[String],
        now: DateTime<Utc>,
        summary: &mut SyncSummary,
    ) -> Result<(), NavsyncError> {
        let options = self.config.merge_options();
        state.accepted.sort_by_key(|batch| batch.date);

        for batch in &state.accepted {
            let outcome = store.merge(batch.date, &batch.observations, options);
            for id in &outcome.added {
                *summary.added.entry(id.clone()).or_insert(0) += 1;
            }
            if !outcome.unchanged_price.is_empty() {
                info!(
                    date = %batch.date,
                    instruments = ?outcome.unchanged_price,
                    "price unchanged since last entry, not refreshed yet"
                );
            }
            if outcome.evicted > 0 {
                debug!(date = %batch.date, evicted = outcome.evicted, "retention cap evicted entries");
            }

            if self.config.mode != SyncMode::Latest {
                let missing = uncovered_instruments(store, batch.date, tracked);
                if !missing.is_empty() {
                    warn!(date = %batch.date, missing = ?missing, "partial instrument coverage");
                    summary.partial.push(PartialCoverage {
                        date: batch.date,
                        missing,
                    });
                }
            }
        }

        summary.newly_unavailable = state
            .unavailable
            .iter()
            .copied()
            .filter(|date| !store.is_unavailable(*date))
            .collect();
        store.mark_unavailable(state.unavailable);
        store.last_synced_at = Some(now);
        if let Some(newest) = state.accepted.last().map(|batch| batch.date) {
            store.last_reported_as_of = store.last_reported_as_of.max(Some(newest));
        }

        self.store_port.commit(store)?;
        summary.committed = true;
        summary.synced_at = Some(now);
        Ok(())
    }
}
