#![allow(dead_code)]

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use navsync::domain::error::{NavsyncError, SourceError};
use navsync::domain::instrument::{Instrument, InstrumentClass};
use navsync::domain::observation::Observation;
use navsync::domain::store::Store;
use navsync::ports::quote_source::{QuoteBatch, QuoteSource};
use navsync::ports::store_port::StorePort;
use rust_decimal::Decimal;
use std::cell::RefCell;
use std::collections::HashMap;

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn at(rfc3339: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(rfc3339)
        .unwrap()
        .with_timezone(&Utc)
}

pub fn instruments() -> Vec<Instrument> {
    vec![
        Instrument::new("RBF5736", "RBC Intl Equity", InstrumentClass::Fund),
        Instrument::new("^GSPC", "S&P 500", InstrumentClass::Index),
    ]
}

/// Deterministic per-day prices so each session is distinguishable.
pub fn fund_price(day: NaiveDate) -> Decimal {
    Decimal::new(120_000 + i64::from(day.ordinal()), 4)
}

pub fn index_price(day: NaiveDate) -> Decimal {
    Decimal::new(480_000 + i64::from(day.ordinal()) * 10, 2)
}

pub fn obs(id: &str, price: Decimal, date: NaiveDate) -> Observation {
    Observation::new(id, price, None, date)
}

/// Full batch for both instruments, reported as `reported`.
pub fn batch(reported: NaiveDate) -> QuoteBatch {
    QuoteBatch {
        observations: vec![
            obs("RBF5736", fund_price(reported), reported),
            obs("^GSPC", index_price(reported), reported),
        ],
        reported_as_of: Some(reported),
    }
}

/// Quote source answering from a script keyed by requested date. Unscripted
/// requests are unavailable.
pub struct MockQuoteSource {
    responses: HashMap<Option<NaiveDate>, Result<QuoteBatch, SourceError>>,
    pub calls: RefCell<Vec<Option<NaiveDate>>>,
}

impl MockQuoteSource {
    pub fn new() -> Self {
        Self {
            responses: HashMap::new(),
            calls: RefCell::new(Vec::new()),
        }
    }

    /// Answer each date with its own session.
    pub fn with_sessions(mut self, dates: &[NaiveDate]) -> Self {
        for &d in dates {
            self.responses.insert(Some(d), Ok(batch(d)));
        }
        self
    }

    /// Answer a request for `requested` with the session of `reported`.
    pub fn with_rollover(mut self, requested: NaiveDate, reported: NaiveDate) -> Self {
        self.responses.insert(Some(requested), Ok(batch(reported)));
        self
    }

    pub fn with_batch(mut self, requested: Option<NaiveDate>, batch: QuoteBatch) -> Self {
        self.responses.insert(requested, Ok(batch));
        self
    }

    pub fn with_error(mut self, requested: Option<NaiveDate>, err: SourceError) -> Self {
        self.responses.insert(requested, Err(err));
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.borrow().len()
    }
}

impl QuoteSource for MockQuoteSource {
    fn fetch(
        &self,
        target: Option<NaiveDate>,
        _instrument_ids: &[String],
    ) -> Result<QuoteBatch, SourceError> {
        self.calls.borrow_mut().push(target);
        self.responses
            .get(&target)
            .cloned()
            .unwrap_or_else(|| Err(SourceError::unavailable("no page for date")))
    }
}

/// In-memory store port that counts commits.
#[derive(Default)]
pub struct MemoryStorePort {
    pub stored: RefCell<Option<Store>>,
    pub commits: RefCell<usize>,
    pub load_error: Option<String>,
}

impl MemoryStorePort {
    pub fn with_store(store: Store) -> Self {
        Self {
            stored: RefCell::new(Some(store)),
            ..Self::default()
        }
    }

    pub fn failing(reason: &str) -> Self {
        Self {
            load_error: Some(reason.to_string()),
            ..Self::default()
        }
    }

    pub fn snapshot(&self) -> Store {
        self.stored.borrow().clone().unwrap_or_default()
    }

    pub fn commit_count(&self) -> usize {
        *self.commits.borrow()
    }
}

impl StorePort for MemoryStorePort {
    fn load(&self) -> Result<Option<Store>, NavsyncError> {
        if let Some(reason) = &self.load_error {
            return Err(NavsyncError::StoreCorrupt {
                path: self.location(),
                reason: reason.clone(),
            });
        }
        Ok(self.stored.borrow().clone())
    }

    fn commit(&self, store: &Store) -> Result<(), NavsyncError> {
        *self.stored.borrow_mut() = Some(store.clone());
        *self.commits.borrow_mut() += 1;
        Ok(())
    }

    fn location(&self) -> String {
        "memory".into()
    }
}
