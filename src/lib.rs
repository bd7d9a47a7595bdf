//! Villa-Sweep: a polite property-listing harvester
//!
//! This crate walks the paginated search results of a property-listing site,
//! fetches every listing page they link to, extracts a structured record from
//! each one and streams the records into CSV and XLSX exports, checkpointing
//! along the way so an interrupted run never loses more than one interval.

pub mod config;
pub mod crawler;
pub mod extract;
pub mod output;
pub mod state;
pub mod url;

use thiserror::Error;

/// Main error type for Villa-Sweep operations
///
/// Only misconfiguration and a search that yields no pages at all are fatal;
/// per-listing failures are recorded in the export instead of surfacing here.
#[derive(Debug, Error)]
pub enum SweepError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("URL error: {0}")]
    UrlError(#[from] UrlError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Could not discover any search pages from {url}: {source}")]
    Discovery {
        url: String,
        source: crawler::FetchError,
    },

    #[error("Failed to fetch search page {page}: {source}")]
    Page {
        page: u32,
        source: crawler::FetchError,
    },

    #[error("Output error: {0}")]
    Output(#[from] output::OutputError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid selector '{selector}': {message}")]
    InvalidSelector { selector: String, message: String },
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing host in URL")]
    MissingHost,

    #[error("Invalid page number {0}: pages are numbered from 1")]
    InvalidPage(u32),
}

/// Result type alias for Villa-Sweep operations
pub type Result<T> = std::result::Result<T, SweepError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{run_sweep, Coordinator, FetchError, Fetcher, HttpFetcher, Scheduler};
pub use extract::{Extractor, Record};
pub use output::{RunSummary, Sink};
pub use state::RunState;
