//! Run parameters handed to the sync orchestrator.

use crate::domain::error::NavsyncError;
use crate::domain::instrument::Instrument;
use crate::domain::reconcile::DEFAULT_MAX_OFFSET_DAYS;
use crate::domain::store::{MergeOptions, MergePolicy};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_WINDOW_SIZE: usize = 5;

/// Upper bound for `window_size` and `bootstrap_window_size`: twenty years of
/// trading days.
pub const MAX_WINDOW_SIZE: usize = 5_200;

pub const MAX_RUN_TIMEOUT_SECS: u64 = 86_400;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncMode {
    /// Fetch only window dates the store does not fully cover.
    #[default]
    Incremental,
    /// Re-request the whole window regardless of coverage.
    Backfill,
    /// One fetch of whatever the source currently shows.
    Latest,
}

impl FromStr for SyncMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "incremental" => Ok(SyncMode::Incremental),
            "backfill" => Ok(SyncMode::Backfill),
            "latest" => Ok(SyncMode::Latest),
            other => Err(format!(
                "unknown mode '{other}' (expected incremental, backfill or latest)"
            )),
        }
    }
}

impl fmt::Display for SyncMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncMode::Incremental => write!(f, "incremental"),
            SyncMode::Backfill => write!(f, "backfill"),
            SyncMode::Latest => write!(f, "latest"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub instruments: Vec<Instrument>,
    pub mode: SyncMode,
    pub window_size: usize,
    /// Window used instead of `window_size` while any tracked instrument has no
    /// history yet.
    pub bootstrap_window_size: Option<usize>,
    pub merge_policy: MergePolicy,
    pub latest_merge_policy: MergePolicy,
    pub max_offset_days: i64,
    pub max_history: Option<usize>,
    pub run_timeout: Option<Duration>,
}

impl SyncConfig {
    pub fn new(instruments: Vec<Instrument>) -> Self {
        Self {
            instruments,
            mode: SyncMode::Incremental,
            window_size: DEFAULT_WINDOW_SIZE,
            bootstrap_window_size: None,
            merge_policy: MergePolicy::DateKeyed,
            latest_merge_policy: MergePolicy::LatestPrice,
            max_offset_days: DEFAULT_MAX_OFFSET_DAYS,
            max_history: None,
            run_timeout: None,
        }
    }

    pub fn tracked_ids(&self) -> Vec<String> {
        self.instruments.iter().map(|i| i.id.clone()).collect()
    }

    pub fn instrument(&self, id: &str) -> Option<&Instrument> {
        self.instruments.iter().find(|i| i.id == id)
    }

    /// Replace the window with a command-line override.
    ///
    /// The override must satisfy the same bounds as the configured value and
    /// fit inside the retention cap, or evicted dates would be fetched again
    /// on every run.
    pub fn override_window(&mut self, size: usize) -> Result<(), NavsyncError> {
        let invalid = |reason: String| NavsyncError::ConfigInvalid {
            section: "sync".into(),
            key: "window_size".into(),
            reason,
        };
        if !(1..=MAX_WINDOW_SIZE).contains(&size) {
            return Err(invalid(format!(
                "--window must be between 1 and {MAX_WINDOW_SIZE}"
            )));
        }
        if let Some(cap) = self.max_history.filter(|cap| *cap < size) {
            return Err(invalid(format!(
                "--window {size} exceeds max_history {cap}"
            )));
        }
        self.window_size = size;
        Ok(())
    }

    pub fn merge_options(&self) -> MergeOptions {
        let policy = match self.mode {
            SyncMode::Latest => self.latest_merge_policy,
            SyncMode::Incremental | SyncMode::Backfill => self.merge_policy,
        };
        MergeOptions {
            policy,
            retention: self.max_history,
        }
    }
}
