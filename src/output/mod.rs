//! Output module for persisting crawl results
//!
//! This module handles:
//! - Accumulating listing records behind a single lock (the sink)
//! - Periodic checkpoints and reading them back for `--resume`
//! - CSV and XLSX exports with a fixed column set
//! - End-of-run statistics

mod checkpoint;
mod row;
mod sink;
pub mod stats;
mod writers;

pub use checkpoint::{load_checkpoint, load_resumable};
pub use row::{record_from_row, record_to_row, Cell, EXPORT_COLUMNS};
pub use sink::{ExportArtifacts, Sink};
pub use stats::{format_duration, print_summary, RunSummary};
pub use writers::{replace_file, CsvTableWriter, TableWriter, XlsxTableWriter};

use thiserror::Error;

/// Errors that can occur during output operations
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("XLSX error: {0}")]
    Xlsx(String),

    #[error("Failed to format output: {0}")]
    Format(String),
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;
