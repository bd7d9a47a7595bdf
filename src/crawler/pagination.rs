//! Search-result pagination
//!
//! Reads the page count from the first search page's pagination control and
//! lists the listing links found on any search page.

use crate::config::Config;
use crate::crawler::fetcher::Fetcher;
use crate::extract::{compile_selector, HtmlDocument, Queryable};
use crate::url::{normalize_listing_url, ListingMatcher, SearchTemplate};
use crate::{ConfigResult, SweepError};
use scraper::Selector;
use std::collections::HashSet;
use std::sync::Arc;
use url::Url;

/// A listing link discovered on a search page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingRef {
    /// Normalized listing URL
    pub url: String,

    /// 1-based search page the link was found on
    pub source_page: u32,

    /// 0-based discovery order within that page
    pub position: u32,
}

/// What the first search page tells us about the whole result set
#[derive(Debug, Clone)]
pub struct Discovery {
    /// Number of search pages to visit, always at least 1
    pub page_count: u32,

    /// Listings already found on page 1
    pub first_page: Vec<ListingRef>,

    /// True when no pagination control was found and the fallback was used
    pub degraded: bool,
}

/// Walks search-result pages
pub struct PaginationWalker {
    fetcher: Arc<dyn Fetcher>,
    link_selector: Selector,
    pagination_selector: Selector,
    listing_markers: Vec<String>,
    excluded_prefixes: Vec<String>,
    page_param: String,
    fallback_page_count: u32,
}

impl PaginationWalker {
    /// Fails if the link or pagination selector does not parse
    pub fn new(fetcher: Arc<dyn Fetcher>, config: &Config) -> ConfigResult<Self> {
        Ok(Self {
            fetcher,
            link_selector: compile_selector(&config.site.listing_link_selector)?,
            pagination_selector: compile_selector(&config.site.pagination_selector)?,
            listing_markers: config.site.listing_path_markers.clone(),
            excluded_prefixes: config.site.excluded_path_prefixes.clone(),
            page_param: config.crawler.page_param.clone(),
            fallback_page_count: config.crawler.fallback_page_count,
        })
    }

    /// Fetches page 1 and reads both the page count and its listings
    ///
    /// Failing to fetch page 1 is the one fatal crawl error: without it no
    /// page can be discovered. A missing or unreadable pagination control is
    /// not fatal; the configured fallback count is used instead.
    pub async fn discover(&self, search: &SearchTemplate) -> Result<Discovery, SweepError> {
        let page_url = search.page_url(1)?;
        let markup = self
            .fetcher
            .fetch(page_url.as_str())
            .await
            .map_err(|source| SweepError::Discovery {
                url: page_url.to_string(),
                source,
            })?;

        let (page_count, first_page) = {
            let doc = HtmlDocument::parse(&markup);
            (
                self.page_count_from(&doc, &page_url),
                self.listings_from(&doc, &page_url, 1),
            )
        };

        let degraded = page_count.is_none();
        let page_count = match page_count {
            Some(count) => count.max(1),
            None => {
                tracing::warn!(
                    "No pagination control found on {}; degraded mode, assuming {} page(s)",
                    page_url,
                    self.fallback_page_count.max(1)
                );
                self.fallback_page_count.max(1)
            }
        };

        Ok(Discovery {
            page_count,
            first_page,
            degraded,
        })
    }

    /// Returns the number of search pages, at least 1
    pub async fn discover_page_count(&self, search: &SearchTemplate) -> Result<u32, SweepError> {
        Ok(self.discover(search).await?.page_count)
    }

    /// Fetches one search page and returns its listing links
    ///
    /// A page past the real last page has no listing anchors and yields an
    /// empty list. Links repeated on the page (card plus promoted block) are
    /// returned once, in first-seen order.
    pub async fn listings_on_page(
        &self,
        search: &SearchTemplate,
        page: u32,
    ) -> Result<Vec<ListingRef>, SweepError> {
        let page_url = search.page_url(page)?;
        let markup = self
            .fetcher
            .fetch(page_url.as_str())
            .await
            .map_err(|source| SweepError::Page { page, source })?;

        let doc = HtmlDocument::parse(&markup);
        Ok(self.listings_from(&doc, &page_url, page))
    }

    fn listings_from(&self, doc: &impl Queryable, page_url: &Url, page: u32) -> Vec<ListingRef> {
        let matcher = ListingMatcher::new(page_url, &self.listing_markers, &self.excluded_prefixes);
        let mut seen = HashSet::new();
        let mut listings = Vec::new();

        for href in doc.attrs(&self.link_selector, "href") {
            let url = match normalize_listing_url(&href, page_url) {
                Ok(url) => url,
                Err(e) => {
                    tracing::trace!("Skipping link '{}': {}", href, e);
                    continue;
                }
            };

            if !matcher.is_listing(&url) || !seen.insert(url.to_string()) {
                continue;
            }

            listings.push(ListingRef {
                url: url.into(),
                source_page: page,
                position: listings.len() as u32,
            });
        }

        listings
    }

    /// Largest page number named by the pagination control
    fn page_count_from(&self, doc: &impl Queryable, page_url: &Url) -> Option<u32> {
        let from_text = doc
            .texts(&self.pagination_selector)
            .into_iter()
            .filter_map(|text| text.trim().parse::<u32>().ok());

        let from_href = doc
            .attrs(&self.pagination_selector, "href")
            .into_iter()
            .filter_map(|href| page_url.join(&href).ok())
            .filter_map(|url| {
                url.query_pairs()
                    .find(|(key, _)| key == self.page_param.as_str())
                    .and_then(|(_, value)| value.trim().parse::<u32>().ok())
            });

        from_text.chain(from_href).filter(|&page| page > 0).max()
    }
}
