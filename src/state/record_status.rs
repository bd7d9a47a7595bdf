/// Record status definitions for tracking listing outcomes
///
/// Every discovered listing ends in exactly one of these states, so the
/// export accounts for each URL the crawl found.
use std::fmt;

/// Final outcome of one listing
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RecordStatus {
    /// Detail page fetched and extracted (fields may still be unknown)
    Ok,

    /// Fetch failed terminally; carries the reason, e.g. `HTTP 404`
    Failed(String),

    /// Never fetched because the run was cancelled first
    Cancelled,
}

impl RecordStatus {
    /// Returns true if the detail page was fetched and extracted
    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok)
    }

    /// Returns true if the fetch failed terminally
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }

    /// Returns true if the listing was skipped by cancellation
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Converts the status to its export column representation
    pub fn to_export_string(&self) -> String {
        match self {
            Self::Ok => "ok".to_string(),
            Self::Failed(reason) => format!("failed: {}", reason),
            Self::Cancelled => "cancelled".to_string(),
        }
    }

    /// Parses a status from its export column representation
    ///
    /// Returns None if the string doesn't match any known status.
    pub fn from_export_str(s: &str) -> Option<Self> {
        match s {
            "ok" => Some(Self::Ok),
            "cancelled" => Some(Self::Cancelled),
            "failed" => Some(Self::Failed(String::new())),
            _ => s
                .strip_prefix("failed: ")
                .map(|reason| Self::Failed(reason.to_string())),
        }
    }
}

impl fmt::Display for RecordStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_export_string())
    }
}
