//! Checkpoint reader
//!
//! Checkpoints are written by the sink in the export's CSV shape. Reading
//! one back is what makes `--resume` possible.

use crate::extract::Record;
use crate::output::row::{record_from_row, EXPORT_COLUMNS};
use crate::output::{OutputError, OutputResult};
use std::path::Path;

/// Loads every record stored in a checkpoint file
///
/// Rows that cannot be read back are skipped with a warning; a header that
/// does not match the current column set rejects the whole file.
pub fn load_checkpoint(path: &Path) -> OutputResult<Vec<Record>> {
    let mut reader = csv::Reader::from_path(path)?;

    let headers = reader.headers()?.clone();
    if !headers.iter().eq(EXPORT_COLUMNS.iter().copied()) {
        return Err(OutputError::Format(format!(
            "checkpoint {} has an unexpected header",
            path.display()
        )));
    }

    let mut records = Vec::new();
    for (line, row) in reader.records().enumerate() {
        let row: Vec<String> = row?.iter().map(str::to_string).collect();
        match record_from_row(&row) {
            Ok(record) => records.push(record),
            Err(e) => tracing::warn!(
                "Skipping checkpoint row {} in {}: {}",
                line + 2,
                path.display(),
                e
            ),
        }
    }

    Ok(records)
}

/// Loads the records of a checkpoint that can stand in for a fresh fetch
///
/// Only rows that were fetched successfully and extracted completely are
/// kept; failed, cancelled and incomplete listings are fetched again.
pub fn load_resumable(path: &Path) -> OutputResult<Vec<Record>> {
    let records = load_checkpoint(path)?;
    let total = records.len();
    let resumable: Vec<Record> = records
        .into_iter()
        .filter(|record| record.status.is_ok() && record.complete)
        .collect();

    tracing::info!(
        "Loaded {} resumable of {} checkpointed records from {}",
        resumable.len(),
        total,
        path.display()
    );
    Ok(resumable)
}
