//! Plain-text run report.

use crate::domain::error::NavsyncError;
use crate::domain::store::Store;
use crate::domain::sync::SyncSummary;
use crate::ports::report_port::ReportPort;
use std::io::Write;

pub struct ConsoleReportAdapter<W: Write> {
    out: W,
}

impl ConsoleReportAdapter<std::io::Stdout> {
    pub fn stdout() -> Self {
        Self {
            out: std::io::stdout(),
        }
    }
}

impl<W: Write> ConsoleReportAdapter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> ReportPort for ConsoleReportAdapter<W> {
    fn write_summary(&mut self, summary: &SyncSummary) -> Result<(), NavsyncError> {
        let out = &mut self.out;

        writeln!(out, "=== Sync Summary ({}) ===", summary.mode)?;
        if !summary.window.is_empty() {
            let oldest = summary.window.last().copied().unwrap_or_default();
            let newest = summary.window.first().copied().unwrap_or_default();
            writeln!(
                out,
                "Window:           {} trading days, {} to {}",
                summary.window.len(),
                oldest,
                newest
            )?;
        }
        writeln!(out, "Dates requested:  {}", summary.targets.len())?;
        writeln!(out, "Dates scraped:    {}", summary.scraped.len())?;
        for date in &summary.scraped {
            writeln!(out, "  {}", date)?;
        }
        writeln!(out, "Dates skipped:    {}", summary.skipped.len())?;
        for skipped in &summary.skipped {
            writeln!(out, "  {}  {}", skipped.date, skipped.reason)?;
        }
        if !summary.newly_unavailable.is_empty() {
            let dates: Vec<String> = summary
                .newly_unavailable
                .iter()
                .map(|d| d.to_string())
                .collect();
            writeln!(out, "Now unavailable:  {}", dates.join(", "))?;
        }
        for partial in &summary.partial {
            writeln!(
                out,
                "Partial coverage: {} missing {}",
                partial.date,
                partial.missing.join(", ")
            )?;
        }

        writeln!(out, "\n=== New Entries ===")?;
        for (id, count) in &summary.added {
            writeln!(out, "  {:<12} +{}", id, count)?;
        }
        writeln!(out, "  {:<12} +{}", "total", summary.total_added())?;

        if !summary.committed {
            writeln!(out, "\nDry run: store not written")?;
        }
        Ok(())
    }

    fn write_status(&mut self, store: &Store, tracked: &[String]) -> Result<(), NavsyncError> {
        let out = &mut self.out;

        for id in tracked {
            match store.record(id) {
                Some(record) => match (record.first(), record.latest()) {
                    (Some(first), Some(last)) => writeln!(
                        out,
                        "{}: {} entries, {} to {}, last {} ({})",
                        id,
                        record.history.len(),
                        first.date,
                        last.date,
                        last.price,
                        record.name
                    )?,
                    _ => writeln!(out, "{}: no history ({})", id, record.name)?,
                },
                None => writeln!(out, "{}: not in store", id)?,
            }
        }

        writeln!(out, "Unavailable dates: {}", store.unavailable_dates.len())?;
        match store.last_synced_at {
            Some(at) => writeln!(out, "Last synced: {}", at.to_rfc3339())?,
            None => writeln!(out, "Last synced: never")?,
        }
        if let Some(as_of) = store.last_reported_as_of {
            writeln!(out, "Source as of: {as_of}")?;
        }
        Ok(())
    }
}
