//! Run report port.

use crate::domain::error::NavsyncError;
use crate::domain::store::Store;
use crate::domain::sync::SyncSummary;

/// Port for presenting run results to the user.
pub trait ReportPort {
    fn write_summary(&mut self, summary: &SyncSummary) -> Result<(), NavsyncError>;

    fn write_status(&mut self, store: &Store, tracked: &[String]) -> Result<(), NavsyncError>;
}
