//! Scheduler for bounded, paced, cancellable crawling
//!
//! This module handles:
//! - Global concurrency limiting via a semaphore
//! - Minimum spacing between request launches
//! - Batching, so at most one batch of work is queued at a time
//! - Driving the page phase and the listing phase of a run
//!
//! Both phases go through the same bounded-batch driver, so pagination,
//! batching and deduplication have a single implementation.

use crate::config::{Config, CrawlerConfig};
use crate::crawler::fetcher::{FetchError, Fetcher};
use crate::crawler::pagination::{ListingRef, PaginationWalker};
use crate::extract::{Extractor, Record};
use crate::output::Sink;
use crate::state::RunState;
use crate::url::SearchTemplate;
use crate::{ConfigResult, SweepError};
use std::collections::HashSet;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinSet;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Listings between progress log lines
const PROGRESS_INTERVAL: usize = 50;

/// Enforces a minimum spacing between request launches
pub struct Pacer {
    interval: Duration,
    next_slot: Mutex<Option<Instant>>,
}

impl Pacer {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            next_slot: Mutex::new(None),
        }
    }

    /// Waits until the next launch slot, then reserves the one after it
    pub async fn wait(&self) {
        if self.interval.is_zero() {
            return;
        }

        let mut next_slot = self.next_slot.lock().await;
        if let Some(at) = *next_slot {
            tokio::time::sleep_until(at).await;
        }
        *next_slot = Some(Instant::now() + self.interval);
    }
}

/// Limits applied to a run
#[derive(Debug, Clone)]
pub struct SchedulerSettings {
    /// Upper bound on search pages, if any
    pub max_pages: Option<u32>,

    /// Requests in flight at once
    pub concurrency_limit: usize,

    /// Minimum spacing between request launches
    pub inter_request_delay: Duration,

    /// Work items queued per batch
    pub batch_size: usize,
}

impl SchedulerSettings {
    pub fn from_config(config: &CrawlerConfig) -> Self {
        Self {
            max_pages: config.max_pages,
            concurrency_limit: config.max_concurrent.max(1) as usize,
            inter_request_delay: Duration::from_secs_f64(config.delay_seconds.max(0.0)),
            batch_size: config.batch_size.max(1) as usize,
        }
    }
}

/// Drives the page phase and the listing phase of one run
pub struct Scheduler {
    fetcher: Arc<dyn Fetcher>,
    walker: Arc<PaginationWalker>,
    extractor: Arc<Extractor>,
    sink: Arc<Sink>,
    settings: SchedulerSettings,
    semaphore: Arc<Semaphore>,
    pacer: Pacer,
    cancel: CancellationToken,
}

impl Scheduler {
    /// Creates a scheduler that streams every outcome into `sink`
    ///
    /// Fails if a configured site selector does not parse.
    pub fn new(
        fetcher: Arc<dyn Fetcher>,
        config: &Config,
        sink: Arc<Sink>,
        cancel: CancellationToken,
    ) -> ConfigResult<Self> {
        let settings = SchedulerSettings::from_config(&config.crawler);
        let walker = PaginationWalker::new(Arc::clone(&fetcher), config)?;
        let extractor = Extractor::new(config.site.clone())?;

        Ok(Self {
            fetcher,
            walker: Arc::new(walker),
            extractor: Arc::new(extractor),
            sink,
            semaphore: Arc::new(Semaphore::new(settings.concurrency_limit)),
            pacer: Pacer::new(settings.inter_request_delay),
            settings,
            cancel,
        })
    }

    /// Crawls every search page and every listing they link to
    ///
    /// Only a failure to discover any page is returned as an error; every
    /// other failure is logged and recorded. On cancellation no new request
    /// is launched, in-flight ones drain, and each discovered listing that
    /// was never fetched is recorded as cancelled.
    pub async fn run(&self, search: &SearchTemplate) -> Result<RunState, SweepError> {
        let discovery = self.walker.discover(search).await?;
        let page_count = match self.settings.max_pages {
            Some(max) => discovery.page_count.min(max.max(1)),
            None => discovery.page_count,
        };

        self.sink.set_pages_discovered(page_count);
        self.sink.on_page(true);
        tracing::info!(
            "Discovered {} search page(s){}; page 1 has {} listings",
            page_count,
            if discovery.degraded { " (fallback)" } else { "" },
            discovery.first_page.len()
        );

        let mut pages = vec![(1, discovery.first_page)];
        pages.extend(self.crawl_pages(search, page_count).await);

        let listings = dedup_listings(pages);
        self.sink.set_listings_queued(listings.len());

        let to_fetch: Vec<ListingRef> = listings
            .into_iter()
            .filter(|l| !self.sink.resume_listing(&l.url, l.source_page, l.position))
            .collect();
        let resumed = self.sink.snapshot().listings_resumed;
        if resumed > 0 {
            tracing::info!("Skipping {} listings restored from checkpoint", resumed);
        }
        let dropped = self.sink.discard_unclaimed();
        if dropped > 0 {
            tracing::info!(
                "Dropping {} checkpointed listings no longer in the search results",
                dropped
            );
        }

        tracing::info!("Fetching {} listings", to_fetch.len());
        self.crawl_listings(to_fetch).await;

        let state = self.sink.snapshot();
        if state.accounted_listings() < state.listings_queued {
            tracing::warn!(
                "{} listings queued but only {} accounted for",
                state.listings_queued,
                state.accounted_listings()
            );
        }
        Ok(state)
    }

    /// Fetches pages 2..=page_count and returns the listings of each
    async fn crawl_pages(
        &self,
        search: &SearchTemplate,
        page_count: u32,
    ) -> Vec<(u32, Vec<ListingRef>)> {
        let walker = Arc::clone(&self.walker);
        let search = search.clone();

        let (results, skipped) = self
            .run_bounded("page", (2..=page_count).collect(), move |page| {
                let walker = Arc::clone(&walker);
                let search = search.clone();
                async move { (page, walker.listings_on_page(&search, page).await) }
            })
            .await;

        if !skipped.is_empty() {
            tracing::info!("Cancelled before fetching {} search page(s)", skipped.len());
        }

        let mut pages = Vec::new();
        for (page, result) in results {
            match result {
                Ok(listings) => {
                    tracing::info!("Page {}: {} listings", page, listings.len());
                    self.sink.on_page(true);
                    pages.push((page, listings));
                }
                Err(SweepError::Page {
                    source: FetchError::Cancelled,
                    ..
                }) => {
                    tracing::debug!("Page {} abandoned on cancellation", page);
                }
                Err(e) => {
                    tracing::warn!("Page {} failed: {}", page, e);
                    self.sink.on_page(false);
                }
            }
        }
        pages
    }

    /// Fetches and extracts listings, streaming each outcome to the sink
    async fn crawl_listings(&self, listings: Vec<ListingRef>) {
        let total = listings.len();

        let fetcher = Arc::clone(&self.fetcher);
        let extractor = Arc::clone(&self.extractor);
        let sink = Arc::clone(&self.sink);
        let progress = Arc::new(AtomicUsize::new(0));

        let (_, skipped) = self
            .run_bounded("listing", listings, move |listing| {
                let fetcher = Arc::clone(&fetcher);
                let extractor = Arc::clone(&extractor);
                let sink = Arc::clone(&sink);
                let progress = Arc::clone(&progress);

                async move {
                    let record = match fetcher.fetch(&listing.url).await {
                        Ok(markup) => extractor.extract(&markup, &listing.url),
                        Err(FetchError::Cancelled) => Record::cancelled(&listing.url),
                        Err(e) => {
                            tracing::warn!("Listing {} failed: {}", listing.url, e);
                            Record::failed(&listing.url, e.to_string())
                        }
                    };
                    let record = record.at_position(listing.source_page, listing.position);

                    if let Err(e) = sink.on_record(record) {
                        tracing::warn!("Checkpoint failed: {}", e);
                    }

                    let finished = progress.fetch_add(1, Ordering::Relaxed) + 1;
                    if finished % PROGRESS_INTERVAL == 0 {
                        tracing::info!("Progress: {}/{} listings", finished, total);
                    }
                }
            })
            .await;

        if !skipped.is_empty() {
            tracing::info!(
                "Cancelled before fetching {} listing(s); recording them as cancelled",
                skipped.len()
            );
        }
        for listing in skipped {
            let record =
                Record::cancelled(&listing.url).at_position(listing.source_page, listing.position);
            if let Err(e) = self.sink.on_record(record) {
                tracing::warn!("Checkpoint failed: {}", e);
            }
        }
    }

    /// Runs `task` over `items` in batches, bounded by the semaphore and
    /// spaced by the pacer
    ///
    /// Each batch is fully drained before the next is queued. Returns the
    /// task results in completion order and the items never launched
    /// because the run was cancelled.
    async fn run_bounded<T, R, F, Fut>(
        &self,
        label: &str,
        items: Vec<T>,
        task: F,
    ) -> (Vec<R>, Vec<T>)
    where
        T: Send + 'static,
        R: Send + 'static,
        F: Fn(T) -> Fut,
        Fut: Future<Output = R> + Send + 'static,
    {
        let total = items.len();
        let mut pending = items.into_iter();
        let mut results = Vec::with_capacity(total);
        let mut skipped = Vec::new();
        let mut batch_number = 0;

        while pending.len() > 0 {
            batch_number += 1;
            let batch: Vec<T> = pending.by_ref().take(self.settings.batch_size).collect();
            tracing::info!(
                "Starting {} batch {} ({} items, {} remaining after it)",
                label,
                batch_number,
                batch.len(),
                pending.len()
            );

            let mut tasks = JoinSet::new();
            let mut batch = batch.into_iter();

            while let Some(item) = batch.next() {
                let permit = tokio::select! {
                    biased;
                    _ = self.cancel.cancelled() => None,
                    permit = Arc::clone(&self.semaphore).acquire_owned() => permit.ok(),
                };
                let Some(permit) = permit else {
                    skipped.push(item);
                    break;
                };

                tokio::select! {
                    biased;
                    _ = self.cancel.cancelled() => {
                        skipped.push(item);
                        break;
                    }
                    _ = self.pacer.wait() => {}
                }

                let fut = task(item);
                tasks.spawn(async move {
                    let result = fut.await;
                    drop(permit);
                    result
                });
            }
            skipped.extend(batch);

            while let Some(joined) = tasks.join_next().await {
                match joined {
                    Ok(result) => results.push(result),
                    Err(e) => tracing::error!("A {} task failed: {}", label, e),
                }
            }

            if self.cancel.is_cancelled() {
                skipped.extend(pending.by_ref());
                break;
            }
        }

        (results, skipped)
    }
}

/// Flattens page results into one list with one entry per URL
///
/// Pages are taken in ascending order and the first occurrence of a URL
/// wins, so a listing repeated on a later page keeps its earliest position.
pub fn dedup_listings(mut pages: Vec<(u32, Vec<ListingRef>)>) -> Vec<ListingRef> {
    pages.sort_by_key(|(page, _)| *page);

    let mut seen = HashSet::new();
    pages
        .into_iter()
        .flat_map(|(_, listings)| listings)
        .filter(|listing| seen.insert(listing.url.clone()))
        .collect()
}
