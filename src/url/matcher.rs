use crate::url::bare_host;
use url::Url;

/// Decides which anchors on a search page point at listing detail pages
///
/// A listing URL must:
/// - live on the same site as the search page (a leading `www.` is ignored)
/// - not start with an excluded path prefix such as `/search`
/// - contain at least one listing marker (e.g. `satilir-`, `kiraye-`)
#[derive(Debug, Clone)]
pub struct ListingMatcher {
    host: String,
    markers: Vec<String>,
    excluded_prefixes: Vec<String>,
}

impl ListingMatcher {
    /// Creates a matcher bound to the host of the search page
    pub fn new(search_url: &Url, markers: &[String], excluded_prefixes: &[String]) -> Self {
        Self {
            host: bare_host(search_url.host_str().unwrap_or_default()),
            markers: markers.to_vec(),
            excluded_prefixes: excluded_prefixes.to_vec(),
        }
    }

    /// Returns true if `url` looks like a listing detail page
    pub fn is_listing(&self, url: &Url) -> bool {
        let same_site = url
            .host_str()
            .map(|host| bare_host(host) == self.host)
            .unwrap_or(false);
        if !same_site {
            return false;
        }

        let path = url.path();
        if self
            .excluded_prefixes
            .iter()
            .any(|prefix| path.starts_with(prefix.as_str()))
        {
            return false;
        }

        self.markers.iter().any(|marker| path.contains(marker.as_str()))
    }
}
