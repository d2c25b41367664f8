//! Tracked instruments and their price precision.

use crate::domain::observation::Observation;
use rust_decimal::{Decimal, RoundingStrategy};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

/// Decimal places kept for `change_percent` regardless of class.
pub const CHANGE_PERCENT_SCALE: u32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InstrumentClass {
    /// Mutual fund NAV, quoted to four places.
    #[default]
    Fund,
    /// Index or ETF close, quoted to two places.
    Index,
}

impl InstrumentClass {
    pub fn price_scale(self) -> u32 {
        match self {
            InstrumentClass::Fund => 4,
            InstrumentClass::Index => 2,
        }
    }
}

impl FromStr for InstrumentClass {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "fund" | "nav" => Ok(InstrumentClass::Fund),
            "index" | "etf" => Ok(InstrumentClass::Index),
            other => Err(format!("unknown instrument class '{other}' (expected fund or index)")),
        }
    }
}

impl fmt::Display for InstrumentClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InstrumentClass::Fund => write!(f, "fund"),
            InstrumentClass::Index => write!(f, "index"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instrument {
    pub id: String,
    pub name: String,
    pub class: InstrumentClass,
}

impl Instrument {
    pub fn new(id: impl Into<String>, name: impl Into<String>, class: InstrumentClass) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            class,
        }
    }

    /// Round an observation to the precision stored for this instrument.
    pub fn normalize(&self, obs: &Observation) -> Observation {
        Observation::new(
            obs.instrument_id.clone(),
            round(obs.price, self.class.price_scale()),
            obs.change_percent.map(|c| round(c, CHANGE_PERCENT_SCALE)),
            obs.date,
        )
    }
}

fn round(value: Decimal, scale: u32) -> Decimal {
    value
        .round_dp_with_strategy(scale, RoundingStrategy::MidpointAwayFromZero)
        .normalize()
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InstrumentListError {
    #[error("empty token in code list")]
    EmptyToken,

    #[error("duplicate code: {0}")]
    DuplicateCode(String),

    #[error("no instruments configured")]
    Empty,
}

/// Parse a comma-separated code list, upper-casing each code.
pub fn parse_codes(input: &str) -> Result<Vec<String>, InstrumentListError> {
    if input.trim().is_empty() {
        return Err(InstrumentListError::Empty);
    }

    let mut codes = Vec::new();
    let mut seen = HashSet::new();

    for token in input.split(',') {
        let trimmed = token.trim();
        if trimmed.is_empty() {
            return Err(InstrumentListError::EmptyToken);
        }
        let code = trimmed.to_uppercase();
        if !seen.insert(code.clone()) {
            return Err(InstrumentListError::DuplicateCode(code));
        }
        codes.push(code);
    }

    Ok(codes)
}
