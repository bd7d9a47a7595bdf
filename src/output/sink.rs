//! Record sink
//!
//! The sink owns the run state. Every completion, counter update,
//! checkpoint and export goes through its single lock, so concurrent
//! listing tasks never touch the record collection directly.

use crate::config::OutputConfig;
use crate::extract::Record;
use crate::output::row::{record_to_row, Cell};
use crate::output::writers::{CsvTableWriter, TableWriter, XlsxTableWriter};
use crate::output::OutputResult;
use crate::state::RunState;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Files produced by [`Sink::finalize`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportArtifacts {
    pub csv_path: PathBuf,
    pub xlsx_path: PathBuf,
    pub checkpoint_path: PathBuf,
    /// Data rows in each export
    pub rows: usize,
}

struct SinkInner {
    state: RunState,
    since_checkpoint: usize,
    checkpoints_written: usize,
}

/// Accumulates records, checkpoints them and writes the final exports
pub struct Sink {
    inner: Mutex<SinkInner>,
    csv_path: PathBuf,
    xlsx_path: PathBuf,
    checkpoint_path: PathBuf,
    checkpoint_interval: usize,
    csv: CsvTableWriter,
    xlsx: XlsxTableWriter,
}

impl Sink {
    /// Creates a sink writing to the configured output paths
    ///
    /// A checkpoint is written after every `checkpoint_interval` records.
    pub fn new(output: &OutputConfig, checkpoint_interval: u32) -> Self {
        Self {
            inner: Mutex::new(SinkInner {
                state: RunState::new(),
                since_checkpoint: 0,
                checkpoints_written: 0,
            }),
            csv_path: PathBuf::from(&output.csv_path),
            xlsx_path: PathBuf::from(&output.xlsx_path),
            checkpoint_path: PathBuf::from(&output.checkpoint_path),
            checkpoint_interval: checkpoint_interval.max(1) as usize,
            csv: CsvTableWriter,
            xlsx: XlsxTableWriter,
        }
    }

    fn lock(&self) -> MutexGuard<'_, SinkInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Path of the periodic checkpoint
    pub fn checkpoint_path(&self) -> &Path {
        &self.checkpoint_path
    }

    /// Seeds the run with records carried over from a checkpoint
    ///
    /// They are exported only once [`Sink::resume_listing`] claims them.
    pub fn restore(&self, records: Vec<Record>) {
        let mut inner = self.lock();
        for record in records {
            inner.state.restore(record);
        }
    }

    /// Claims a discovered listing for a restored record
    ///
    /// Returns true if a checkpointed record for `url` exists, in which case
    /// it is moved to the new discovery position and need not be fetched.
    pub fn resume_listing(&self, url: &str, source_page: u32, position: u32) -> bool {
        self.lock().state.claim(url, source_page, position)
    }

    /// Forgets restored records this run did not rediscover
    ///
    /// Returns how many were dropped.
    pub fn discard_unclaimed(&self) -> usize {
        self.lock().state.discard_unclaimed()
    }

    /// Records how many search pages the run will visit
    pub fn set_pages_discovered(&self, pages: u32) {
        self.lock().state.pages_discovered = pages;
    }

    /// Records the outcome of one search page
    pub fn on_page(&self, succeeded: bool) {
        let mut inner = self.lock();
        if succeeded {
            inner.state.pages_processed += 1;
        } else {
            inner.state.pages_failed += 1;
        }
    }

    /// Records how many unique listings were handed to the detail phase
    pub fn set_listings_queued(&self, listings: usize) {
        self.lock().state.listings_queued = listings;
    }

    /// Accepts one listing outcome
    ///
    /// Writes a checkpoint when the interval is reached. The record is kept
    /// even if that checkpoint fails.
    pub fn on_record(&self, record: Record) -> OutputResult<()> {
        let mut inner = self.lock();
        inner.state.apply(record);
        inner.since_checkpoint += 1;

        if inner.since_checkpoint >= self.checkpoint_interval {
            inner.since_checkpoint = 0;
            self.write_checkpoint(&mut inner)?;
        }
        Ok(())
    }

    /// Writes the accumulated records to the checkpoint file
    pub fn checkpoint(&self) -> OutputResult<()> {
        let mut inner = self.lock();
        inner.since_checkpoint = 0;
        self.write_checkpoint(&mut inner)
    }

    fn write_checkpoint(&self, inner: &mut SinkInner) -> OutputResult<()> {
        let rows = ordered_rows(&inner.state);
        self.csv.write_table(&self.checkpoint_path, &rows)?;
        inner.checkpoints_written += 1;

        tracing::debug!(
            "Checkpoint {} written to {} ({} records)",
            inner.checkpoints_written,
            self.checkpoint_path.display(),
            rows.len()
        );
        Ok(())
    }

    /// Writes the ordered CSV and XLSX exports plus a final checkpoint
    ///
    /// Calling it again without new records rewrites identical CSV bytes.
    pub fn finalize(&self) -> OutputResult<ExportArtifacts> {
        let mut inner = self.lock();
        let rows = ordered_rows(&inner.state);

        for (writer, path) in [
            (&self.csv as &dyn TableWriter, &self.csv_path),
            (&self.xlsx as &dyn TableWriter, &self.xlsx_path),
        ] {
            writer.write_table(path, &rows)?;
            tracing::info!(
                "Wrote {} rows to {} ({})",
                rows.len(),
                path.display(),
                writer.format_name()
            );
        }

        inner.since_checkpoint = 0;
        self.write_checkpoint(&mut inner)?;

        Ok(ExportArtifacts {
            csv_path: self.csv_path.clone(),
            xlsx_path: self.xlsx_path.clone(),
            checkpoint_path: self.checkpoint_path.clone(),
            rows: rows.len(),
        })
    }

    /// Number of checkpoints written so far
    pub fn checkpoints_written(&self) -> usize {
        self.lock().checkpoints_written
    }

    /// A copy of the current run state
    pub fn snapshot(&self) -> RunState {
        self.lock().state.clone()
    }
}

fn ordered_rows(state: &RunState) -> Vec<Vec<Cell>> {
    state.ordered_records().iter().map(record_to_row).collect()
}
