//! Tabular file writers
//!
//! Both writers replace their target atomically: the table is written to a
//! sibling temporary file which is then renamed over the target, so a crash
//! mid-write never leaves a truncated export or checkpoint behind.

use crate::output::row::{Cell, EXPORT_COLUMNS};
use crate::output::{OutputError, OutputResult};
use rust_xlsxwriter::Workbook;
use std::fs;
use std::path::{Path, PathBuf};

/// Writes an ordered sequence of uniformly shaped rows to a file
pub trait TableWriter: Send + Sync {
    /// Short format name used in logs
    fn format_name(&self) -> &'static str;

    /// Writes the header plus `rows` to `path`, replacing any existing file
    fn write_table(&self, path: &Path, rows: &[Vec<Cell>]) -> OutputResult<()>;
}

/// CSV writer backed by the `csv` crate
#[derive(Debug, Default, Clone, Copy)]
pub struct CsvTableWriter;

impl CsvTableWriter {
    /// Renders the table to CSV bytes
    pub fn to_bytes(rows: &[Vec<Cell>]) -> OutputResult<Vec<u8>> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record(EXPORT_COLUMNS)?;
        for row in rows {
            writer.write_record(row.iter().map(Cell::as_text))?;
        }
        writer
            .into_inner()
            .map_err(|e| OutputError::Format(format!("Failed to flush CSV: {}", e)))
    }
}

impl TableWriter for CsvTableWriter {
    fn format_name(&self) -> &'static str {
        "csv"
    }

    fn write_table(&self, path: &Path, rows: &[Vec<Cell>]) -> OutputResult<()> {
        let bytes = Self::to_bytes(rows)?;
        replace_file(path, &bytes)
    }
}

/// Spreadsheet writer backed by `rust_xlsxwriter`
///
/// Cell text matches the CSV export; known numbers are written as numeric
/// cells.
#[derive(Debug, Default, Clone, Copy)]
pub struct XlsxTableWriter;

const SHEET_NAME: &str = "Listings";

impl TableWriter for XlsxTableWriter {
    fn format_name(&self) -> &'static str {
        "xlsx"
    }

    fn write_table(&self, path: &Path, rows: &[Vec<Cell>]) -> OutputResult<()> {
        let mut workbook = Workbook::new();
        let worksheet = workbook.add_worksheet();
        worksheet
            .set_name(SHEET_NAME)
            .map_err(|e| OutputError::Xlsx(format!("Failed to name worksheet: {}", e)))?;

        for (col, header) in EXPORT_COLUMNS.iter().enumerate() {
            worksheet
                .write_string(0, col as u16, *header)
                .map_err(|e| {
                    OutputError::Xlsx(format!("Failed to write header '{}': {}", header, e))
                })?;
        }

        for (i, row) in rows.iter().enumerate() {
            let r = (i + 1) as u32;
            for (col, cell) in row.iter().enumerate() {
                let written = match cell {
                    Cell::Text(text) => worksheet.write_string(r, col as u16, text),
                    Cell::Number(n) => worksheet.write_number(r, col as u16, *n),
                };
                written.map_err(|e| {
                    OutputError::Xlsx(format!("Failed to write row {} column {}: {}", r, col, e))
                })?;
            }
        }

        let buffer = workbook
            .save_to_buffer()
            .map_err(|e| OutputError::Xlsx(format!("Failed to save workbook: {}", e)))?;

        replace_file(path, &buffer)
    }
}

/// Writes `bytes` to a temporary sibling of `path`, then renames it into place
pub fn replace_file(path: &Path, bytes: &[u8]) -> OutputResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let tmp = temp_path(path);
    fs::write(&tmp, bytes)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}
