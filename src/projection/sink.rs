//! Output sinks fed by the engine after every period
//!
//! The engine only knows the [`PeriodSink`] trait. File-backed outputs go
//! through [`StagedFile`], which writes to a temporary sibling and renames
//! it into place on commit, so a failed run never leaves a partial file.

use super::cashflows::PeriodRecord;
use super::state::LifecycleStage;
use crate::account::BalanceEvent;
use serde::Serialize;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("Output I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("CSV output error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON output error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Consumer of per-period output
pub trait PeriodSink {
    /// Called once per processed period with the events logged in it
    fn on_period(&mut self, record: &PeriodRecord, events: &[BalanceEvent]) -> Result<(), SinkError>;

    /// Called once after the last period of a successful run. Flushes
    /// buffered output; staged files are committed by whoever owns them.
    fn finish(&mut self) -> Result<(), SinkError> {
        Ok(())
    }
}

// ============================================================================
// Staged file
// ============================================================================

/// File written under a temporary name and renamed into place on commit.
/// Dropping it uncommitted removes the temporary file.
#[derive(Debug)]
pub struct StagedFile {
    writer: Option<BufWriter<File>>,
    temp_path: PathBuf,
    final_path: PathBuf,
}

impl StagedFile {
    pub fn create(path: impl AsRef<Path>) -> io::Result<Self> {
        let final_path = path.as_ref().to_path_buf();
        let mut temp_name = final_path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        temp_name.push(".partial");
        let temp_path = final_path.with_file_name(temp_name);

        let file = File::create(&temp_path)?;
        Ok(Self {
            writer: Some(BufWriter::new(file)),
            temp_path,
            final_path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.final_path
    }

    /// Flush and move the file to its final name
    pub fn commit(&mut self) -> io::Result<()> {
        if let Some(writer) = self.writer.take() {
            let file = writer.into_inner().map_err(|e| e.into_error())?;
            file.sync_all()?;
            drop(file);
            fs::rename(&self.temp_path, &self.final_path)?;
        }
        Ok(())
    }

    fn writer(&mut self) -> io::Result<&mut BufWriter<File>> {
        self.writer
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "staged file already committed"))
    }
}

impl Write for StagedFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.writer()?.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.writer.as_mut() {
            Some(writer) => writer.flush(),
            None => Ok(()),
        }
    }
}

impl Drop for StagedFile {
    fn drop(&mut self) {
        if self.writer.take().is_some() {
            if let Err(e) = fs::remove_file(&self.temp_path) {
                log::warn!("Could not remove {}: {}", self.temp_path.display(), e);
            }
        }
    }
}

// ============================================================================
// Console table
// ============================================================================

/// Fixed-width table, one row per period
pub struct TableSink<W: Write> {
    writer: W,
    header_written: bool,
}

impl<W: Write> TableSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            header_written: false,
        }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    fn write_header(&mut self) -> io::Result<()> {
        writeln!(
            self.writer,
            "{:<8} {:>4} {:>13} {:>13} {:>13} {:>13} {:>12} {:>13} {:>10}  {}",
            "Period", "Age", "OA", "SA", "MA", "RA", "Loan", "Excess", "Payout", "Stage"
        )?;
        writeln!(self.writer, "{}", "-".repeat(124))
    }
}

impl<W: Write> PeriodSink for TableSink<W> {
    fn on_period(&mut self, record: &PeriodRecord, _events: &[BalanceEvent]) -> Result<(), SinkError> {
        if !self.header_written {
            self.write_header()?;
            self.header_written = true;
        }
        let b = &record.balances;
        writeln!(
            self.writer,
            "{:<8} {:>4} {:>13.2} {:>13.2} {:>13.2} {:>13.2} {:>12.2} {:>13.2} {:>10.2}  {}",
            record.period_end.format("%Y-%m"),
            record.age,
            b.ordinary,
            b.special,
            b.medisave,
            b.retirement,
            b.loan,
            b.excess,
            record.payout,
            record.stage,
        )?;
        Ok(())
    }

    fn finish(&mut self) -> Result<(), SinkError> {
        self.writer.flush()?;
        Ok(())
    }
}

// ============================================================================
// CSV
// ============================================================================

/// Flat CSV row; the csv crate cannot serialize nested structs
#[derive(Debug, Serialize)]
struct CsvRow {
    period: String,
    age: u32,
    stage: LifecycleStage,
    oa: f64,
    sa: f64,
    ma: f64,
    ra: f64,
    loan: f64,
    excess: f64,
    contribution: f64,
    loan_payment: f64,
    interest: f64,
    payout: f64,
}

impl From<&PeriodRecord> for CsvRow {
    fn from(record: &PeriodRecord) -> Self {
        let b = &record.balances;
        Self {
            period: record.period_end.format("%Y-%m").to_string(),
            age: record.age,
            stage: record.stage,
            oa: b.ordinary,
            sa: b.special,
            ma: b.medisave,
            ra: b.retirement,
            loan: b.loan,
            excess: b.excess,
            contribution: record.contribution,
            loan_payment: record.loan_payment,
            interest: record.interest,
            payout: record.payout,
        }
    }
}

/// Period records as CSV, staged until the caller commits the file
pub struct CsvSink {
    writer: csv::Writer<StagedFile>,
}

impl CsvSink {
    pub fn create(path: impl AsRef<Path>) -> Result<Self, SinkError> {
        let staged = StagedFile::create(path)?;
        Ok(Self {
            writer: csv::Writer::from_writer(staged),
        })
    }

    /// Flush and hand back the staged file, still uncommitted
    pub fn into_staged(self) -> Result<StagedFile, SinkError> {
        self.writer
            .into_inner()
            .map_err(|e| SinkError::Io(e.into_error()))
    }
}

impl PeriodSink for CsvSink {
    fn on_period(&mut self, record: &PeriodRecord, _events: &[BalanceEvent]) -> Result<(), SinkError> {
        self.writer.serialize(CsvRow::from(record))?;
        Ok(())
    }

    fn finish(&mut self) -> Result<(), SinkError> {
        self.writer.flush()?;
        Ok(())
    }
}

// ============================================================================
// JSON lines event log
// ============================================================================

/// Every balance event as one JSON object per line
pub struct JsonLinesSink<W: Write> {
    writer: W,
    events_written: usize,
}

impl<W: Write> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            events_written: 0,
        }
    }

    pub fn events_written(&self) -> usize {
        self.events_written
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> PeriodSink for JsonLinesSink<W> {
    fn on_period(&mut self, _record: &PeriodRecord, events: &[BalanceEvent]) -> Result<(), SinkError> {
        for event in events {
            serde_json::to_writer(&mut self.writer, event)?;
            self.writer.write_all(b"\n")?;
        }
        self.events_written += events.len();
        Ok(())
    }

    fn finish(&mut self) -> Result<(), SinkError> {
        self.writer.flush()?;
        Ok(())
    }
}

// ============================================================================
// In-memory
// ============================================================================

/// Retains everything it is given
#[derive(Debug, Clone, Default)]
pub struct CollectingSink {
    pub records: Vec<PeriodRecord>,
    pub events: Vec<BalanceEvent>,
    pub finished: bool,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PeriodSink for CollectingSink {
    fn on_period(&mut self, record: &PeriodRecord, events: &[BalanceEvent]) -> Result<(), SinkError> {
        self.records.push(record.clone());
        self.events.extend_from_slice(events);
        Ok(())
    }

    fn finish(&mut self) -> Result<(), SinkError> {
        self.finished = true;
        Ok(())
    }
}
