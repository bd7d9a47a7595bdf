//! Crawler coordinator - run orchestration
//!
//! This module wires one run together:
//! - Validating the search URL template
//! - Building the fetcher, sink and scheduler from the configuration
//! - Restoring checkpointed records on resume
//! - Finalizing the exports, also after cancellation
//! - Summarizing the run

use crate::config::Config;
use crate::crawler::fetcher::{Fetcher, HttpFetcher};
use crate::crawler::scheduler::Scheduler;
use crate::output::{load_resumable, RunSummary, Sink};
use crate::url::SearchTemplate;
use crate::{ConfigError, SweepError};
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

/// Main crawler coordinator structure
pub struct Coordinator {
    config: Config,
    search: SearchTemplate,
    fetcher: Arc<dyn Fetcher>,
    sink: Arc<Sink>,
    cancel: CancellationToken,
    resume: bool,
}

impl Coordinator {
    /// Creates a coordinator using the HTTP fetcher
    ///
    /// Fails if no valid search URL is configured or the HTTP client cannot
    /// be built; nothing has been fetched at that point.
    pub fn new(config: Config, cancel: CancellationToken) -> Result<Self, SweepError> {
        let fetcher = HttpFetcher::new(&config, cancel.clone())?;
        Self::with_fetcher(config, Arc::new(fetcher), cancel)
    }

    /// Creates a coordinator around any fetcher
    pub fn with_fetcher(
        config: Config,
        fetcher: Arc<dyn Fetcher>,
        cancel: CancellationToken,
    ) -> Result<Self, SweepError> {
        let search_url = config.crawler.search_url.as_deref().ok_or_else(|| {
            ConfigError::Validation("crawler.search-url must be set".to_string())
        })?;
        let search = SearchTemplate::new(search_url, &config.crawler.page_param)?;
        let sink = Arc::new(Sink::new(&config.output, config.crawler.checkpoint_interval));

        Ok(Self {
            config,
            search,
            fetcher,
            sink,
            cancel,
            resume: false,
        })
    }

    /// Carries complete records over from the checkpoint instead of
    /// re-fetching them
    pub fn resume(mut self, resume: bool) -> Self {
        self.resume = resume;
        self
    }

    /// The sink receiving this run's records
    pub fn sink(&self) -> Arc<Sink> {
        Arc::clone(&self.sink)
    }

    /// Runs the crawl and writes the exports
    ///
    /// A cancelled run still finalizes whatever it accumulated. Only a
    /// failure to discover the search pages aborts without an export.
    pub async fn run(&self) -> Result<RunSummary, SweepError> {
        let start = Instant::now();
        tracing::info!("Starting sweep of {}", self.search.as_str());

        if self.resume {
            self.restore_checkpoint();
        }

        let scheduler = Scheduler::new(
            Arc::clone(&self.fetcher),
            &self.config,
            Arc::clone(&self.sink),
            self.cancel.clone(),
        )?;

        let state = scheduler.run(&self.search).await?;
        if self.cancel.is_cancelled() {
            tracing::warn!(
                "Run cancelled; finalizing {} accumulated records",
                state.records.len()
            );
        }

        let artifacts = self.sink.finalize()?;
        let summary = RunSummary::from_state(
            &self.sink.snapshot(),
            start.elapsed(),
            self.cancel.is_cancelled(),
            artifacts,
        );
        summary.log();

        Ok(summary)
    }

    fn restore_checkpoint(&self) {
        let path = self.sink.checkpoint_path();
        if !path.exists() {
            tracing::info!("No checkpoint at {}; starting from scratch", path.display());
            return;
        }

        match load_resumable(path) {
            Ok(records) => {
                tracing::info!(
                    "Loaded {} complete records from checkpoint {}",
                    records.len(),
                    path.display()
                );
                self.sink.restore(records);
            }
            Err(e) => tracing::warn!(
                "Ignoring unreadable checkpoint {}: {}",
                path.display(),
                e
            ),
        }
    }
}

/// Runs a complete sweep with the HTTP fetcher
///
/// This is the main entry point. It will:
/// 1. Build the HTTP client and fetcher
/// 2. Discover the search pages
/// 3. Fetch and extract every listing
/// 4. Write the CSV and XLSX exports
pub async fn run_sweep(
    config: Config,
    cancel: CancellationToken,
    resume: bool,
) -> Result<RunSummary, SweepError> {
    Coordinator::new(config, cancel)?.resume(resume).run().await
}
