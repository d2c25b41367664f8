//! A single instrument quote for one date.

use chrono::NaiveDate;
use rust_decimal::Decimal;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Observation {
    pub instrument_id: String,
    pub price: Decimal,
    pub change_percent: Option<Decimal>,
    pub date: NaiveDate,
}

impl Observation {
    pub fn new(
        instrument_id: impl Into<String>,
        price: Decimal,
        change_percent: Option<Decimal>,
        date: NaiveDate,
    ) -> Self {
        Self {
            instrument_id: instrument_id.into(),
            price,
            change_percent,
            date,
        }
    }

    /// Copy of this observation keyed to `date`.
    pub fn rekeyed(&self, date: NaiveDate) -> Self {
        Self {
            date,
            ..self.clone()
        }
    }
}
