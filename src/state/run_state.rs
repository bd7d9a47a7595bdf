use crate::extract::Record;
use crate::state::RecordStatus;
use std::collections::{HashMap, HashSet};

/// Progress and results of one crawl invocation
///
/// Owned by the sink; every mutation goes through the sink's lock so
/// concurrent completions never write the collection directly.
#[derive(Debug, Clone, Default)]
pub struct RunState {
    /// Search pages the run intends to visit
    pub pages_discovered: u32,

    /// Search pages fetched and parsed
    pub pages_processed: u32,

    /// Search pages whose fetch failed
    pub pages_failed: u32,

    /// Unique listings handed to the detail phase
    pub listings_queued: usize,

    /// Listings fetched and extracted in this run
    pub listings_completed: usize,

    /// Listings whose detail fetch failed terminally
    pub listings_failed: usize,

    /// Listings never fetched because the run was cancelled
    pub listings_cancelled: usize,

    /// Checkpointed listings rediscovered and reused instead of re-fetched
    pub listings_resumed: usize,

    /// One record per unique listing URL, in arrival order
    pub records: Vec<Record>,

    by_url: HashMap<String, usize>,
    restored: HashSet<String>,

    /// Checkpointed records not yet claimed by a rediscovered listing
    carried: HashMap<String, Record>,
}

impl RunState {
    /// Creates an empty run state
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the outcome of a listing
    ///
    /// A second outcome for the same URL replaces the first so the export
    /// never holds two rows for one listing.
    pub fn apply(&mut self, record: Record) {
        self.carried.remove(&record.url);
        self.count(&record.status, 1);
        self.upsert(record);
    }

    /// Holds a checkpointed record until this run rediscovers its URL
    ///
    /// Carried records are not part of the export until claimed.
    pub fn restore(&mut self, record: Record) {
        self.carried.insert(record.url.clone(), record);
    }

    /// Reuses the carried record for `url` at its new discovery position
    ///
    /// Returns false if no checkpointed record exists for `url`.
    pub fn claim(&mut self, url: &str, source_page: u32, page_position: u32) -> bool {
        let Some(record) = self.carried.remove(url) else {
            return false;
        };

        self.upsert(record.at_position(source_page, page_position));
        self.restored.insert(url.to_string());
        self.listings_resumed += 1;
        true
    }

    /// Checkpointed records still waiting to be claimed
    pub fn unclaimed(&self) -> usize {
        self.carried.len()
    }

    /// Drops carried records whose listings were not rediscovered
    pub fn discard_unclaimed(&mut self) -> usize {
        let dropped = self.carried.len();
        self.carried.clear();
        dropped
    }

    /// Returns the record for `url`, if any
    pub fn get(&self, url: &str) -> Option<&Record> {
        self.by_url.get(url).map(|&index| &self.records[index])
    }

    /// Records sorted by (source page, position on page, URL)
    pub fn ordered_records(&self) -> Vec<Record> {
        let mut records = self.records.clone();
        records.sort_by(|a, b| a.order_key().cmp(&b.order_key()));
        records
    }

    /// Listings with a final outcome, restored ones included
    pub fn accounted_listings(&self) -> usize {
        self.listings_completed
            + self.listings_failed
            + self.listings_cancelled
            + self.listings_resumed
    }

    fn upsert(&mut self, record: Record) {
        match self.by_url.get(&record.url) {
            Some(&index) => {
                let previous = std::mem::replace(&mut self.records[index], record);
                if self.restored.remove(&previous.url) {
                    self.listings_resumed -= 1;
                } else {
                    self.count(&previous.status, -1);
                }
            }
            None => {
                self.by_url.insert(record.url.clone(), self.records.len());
                self.records.push(record);
            }
        }
    }

    fn count(&mut self, status: &RecordStatus, delta: isize) {
        let counter = match status {
            RecordStatus::Ok => &mut self.listings_completed,
            RecordStatus::Failed(_) => &mut self.listings_failed,
            RecordStatus::Cancelled => &mut self.listings_cancelled,
        };
        *counter = counter.saturating_add_signed(delta);
    }
}
