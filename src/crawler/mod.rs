//! Crawler module for fetching search and listing pages
//!
//! This module contains the core crawling logic, including:
//! - HTTP fetching with a retry state machine
//! - Pagination discovery and listing-link collection
//! - Bounded, paced and cancellable request scheduling
//! - Overall run coordination

mod coordinator;
mod fetcher;
mod pagination;
mod retry;
mod scheduler;

pub use coordinator::{run_sweep, Coordinator};
pub use fetcher::{build_http_client, ErrorClass, FetchError, Fetcher, HttpFetcher};
pub use pagination::{Discovery, ListingRef, PaginationWalker};
pub use retry::{retry_with_policy, AttemptOutcome, Backoff, RetryPolicy, RetryState};
pub use scheduler::{dedup_listings, Pacer, Scheduler, SchedulerSettings};
