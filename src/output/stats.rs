//! End-of-run statistics
//!
//! This module summarizes a finished run's state and displays it, both in
//! the run log and on stdout.

use crate::extract::UNKNOWN;
use crate::output::ExportArtifacts;
use crate::state::RunState;
use std::collections::HashMap;
use std::time::Duration;

/// Run summary statistics
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub pages_discovered: u32,
    pub pages_processed: u32,
    pub pages_failed: u32,

    pub listings_queued: usize,
    pub listings_completed: usize,
    pub listings_failed: usize,
    pub listings_cancelled: usize,
    pub listings_resumed: usize,

    /// Records with every core field present
    pub complete_records: usize,

    /// Records with at least one phone number
    pub listings_with_phone: usize,

    /// (category, count), most frequent first
    pub category_breakdown: Vec<(String, usize)>,

    /// Wall-clock duration of the run
    pub elapsed: Duration,

    /// True when the run stopped early on a cancellation signal
    pub cancelled: bool,

    /// Files written by the final export
    pub artifacts: ExportArtifacts,
}

impl RunSummary {
    /// Builds the summary from the final run state
    pub fn from_state(
        state: &RunState,
        elapsed: Duration,
        cancelled: bool,
        artifacts: ExportArtifacts,
    ) -> Self {
        let mut categories: HashMap<&str, usize> = HashMap::new();
        for record in state.records.iter().filter(|r| r.status.is_ok()) {
            let category = record.category.as_deref().unwrap_or(UNKNOWN);
            *categories.entry(category).or_insert(0) += 1;
        }

        let mut category_breakdown: Vec<(String, usize)> = categories
            .into_iter()
            .map(|(category, count)| (category.to_string(), count))
            .collect();
        // Sort by count descending, then name for a stable report
        category_breakdown.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

        Self {
            pages_discovered: state.pages_discovered,
            pages_processed: state.pages_processed,
            pages_failed: state.pages_failed,
            listings_queued: state.listings_queued,
            listings_completed: state.listings_completed,
            listings_failed: state.listings_failed,
            listings_cancelled: state.listings_cancelled,
            listings_resumed: state.listings_resumed,
            complete_records: state.records.iter().filter(|r| r.complete).count(),
            listings_with_phone: state
                .records
                .iter()
                .filter(|r| !r.phones.is_empty())
                .count(),
            category_breakdown,
            elapsed,
            cancelled,
            artifacts,
        }
    }

    /// Total rows in the export
    pub fn total_records(&self) -> usize {
        self.listings_completed + self.listings_failed + self.listings_cancelled + self.listings_resumed
    }

    /// Average wall-clock time per listing fetched in this run
    pub fn average_per_listing(&self) -> Option<Duration> {
        let fetched = self.listings_completed + self.listings_failed;
        (fetched > 0).then(|| self.elapsed / fetched as u32)
    }

    /// Share of exported records with a phone number, as a percentage
    pub fn phone_coverage(&self) -> f64 {
        let total = self.total_records();
        if total == 0 {
            return 0.0;
        }
        (self.listings_with_phone as f64 / total as f64) * 100.0
    }

    /// Writes the summary to the run log
    pub fn log(&self) {
        tracing::info!(
            "Run {}: {} pages processed ({} failed), {} listings completed, {} failed, {} cancelled, {} resumed in {}",
            if self.cancelled { "cancelled" } else { "finished" },
            self.pages_processed,
            self.pages_failed,
            self.listings_completed,
            self.listings_failed,
            self.listings_cancelled,
            self.listings_resumed,
            format_duration(self.elapsed)
        );
    }
}

/// Formats a duration as `HH:MM:SS`
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    format!("{:02}:{:02}:{:02}", secs / 3600, (secs % 3600) / 60, secs % 60)
}

/// Prints the summary to stdout in a formatted manner
pub fn print_summary(summary: &RunSummary) {
    println!("=== Villa-Sweep Summary ===\n");

    if summary.cancelled {
        println!("Run was cancelled; the export is partial.\n");
    }

    println!("Pages:");
    println!("  Discovered: {}", summary.pages_discovered);
    println!("  Processed: {}", summary.pages_processed);
    println!("  Failed: {}", summary.pages_failed);
    println!();

    println!("Listings:");
    println!("  Queued: {}", summary.listings_queued);
    println!("  Completed: {}", summary.listings_completed);
    println!("  Failed: {}", summary.listings_failed);
    println!("  Cancelled: {}", summary.listings_cancelled);
    println!("  Resumed from checkpoint: {}", summary.listings_resumed);
    println!("  Complete records: {}", summary.complete_records);
    println!(
        "  With phone number: {} ({:.1}%)",
        summary.listings_with_phone,
        summary.phone_coverage()
    );
    println!();

    println!("Timing:");
    println!("  Elapsed: {}", format_duration(summary.elapsed));
    if let Some(average) = summary.average_per_listing() {
        println!("  Average per listing: {:.2}s", average.as_secs_f64());
    }
    println!();

    if !summary.category_breakdown.is_empty() {
        println!("Categories:");
        for (category, count) in &summary.category_breakdown {
            println!("  {}: {}", category, count);
        }
        println!();
    }

    println!("Exports:");
    println!("  CSV: {}", summary.artifacts.csv_path.display());
    println!("  XLSX: {}", summary.artifacts.xlsx_path.display());
    println!("  Rows: {}", summary.artifacts.rows);
}
