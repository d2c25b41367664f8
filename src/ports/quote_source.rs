//! Quote source port.

use crate::domain::error::SourceError;
use crate::domain::observation::Observation;
use chrono::NaiveDate;

/// What a source returned for one fetch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QuoteBatch {
    pub observations: Vec<Observation>,
    /// The date the source says its prices are for, when it says at all.
    pub reported_as_of: Option<NaiveDate>,
}

pub trait QuoteSource {
    /// Fetch quotes for all of `instrument_ids` in one call.
    ///
    /// `target` of `None` asks for whatever the source currently shows.
    fn fetch(
        &self,
        target: Option<NaiveDate>,
        instrument_ids: &[String],
    ) -> Result<QuoteBatch, SourceError>;

    fn name(&self) -> &str {
        "quote source"
    }
}
