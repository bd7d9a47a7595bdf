use crate::url::bare_host;
use crate::UrlError;
use url::Url;

/// Query parameters that never identify a listing
const TRACKING_PARAMS: &[&str] = &[
    "utm_source",
    "utm_medium",
    "utm_campaign",
    "utm_term",
    "utm_content",
    "fbclid",
    "gclid",
    "mc_eid",
    "ref",
    "source",
];

/// Resolves a listing href against the page it was found on and normalizes it
///
/// Two anchors that point at the same listing (a card and a promoted tile,
/// say) must normalize to the same string so deduplication can compare them.
///
/// # Normalization Steps
///
/// 1. Resolve the href against `base`; reject if malformed
/// 2. Require an http or https scheme
/// 3. Rewrite a `www.`/bare variant of the base host to the base host's form
/// 4. Normalize the path:
///    - Remove dot segments (. and ..) and repeated slashes
///    - Remove trailing slash (except for root /)
/// 5. Remove the fragment
/// 6. Remove tracking query parameters and sort the rest
///
/// Hosts of other sites are left as they are.
///
/// # Examples
///
/// ```
/// use url::Url;
/// use villa_sweep::url::normalize_listing_url;
///
/// let base = Url::parse("https://villa.az/search?page=2").unwrap();
/// let url = normalize_listing_url("/satilir-villa-123/#gallery", &base).unwrap();
/// assert_eq!(url.as_str(), "https://villa.az/satilir-villa-123");
/// ```
pub fn normalize_listing_url(href: &str, base: &Url) -> Result<Url, UrlError> {
    let mut url = base
        .join(href.trim())
        .map_err(|e| UrlError::Parse(e.to_string()))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(url.scheme().to_string()));
    }

    let host = url.host_str().ok_or(UrlError::MissingHost)?.to_string();
    if let Some(base_host) = base.host_str() {
        if host != base_host && bare_host(&host) == bare_host(base_host) {
            url.set_host(Some(base_host))
                .map_err(|e| UrlError::Parse(e.to_string()))?;
        }
    }

    let normalized_path = normalize_path(url.path());
    url.set_path(&normalized_path);

    url.set_fragment(None);

    if url.query().is_some() {
        let params = filter_and_sort_query_params(&url);
        if params.is_empty() {
            url.set_query(None);
        } else {
            url.query_pairs_mut().clear().extend_pairs(params);
        }
    }

    Ok(url)
}

/// Normalizes a URL path by removing dot segments and trailing slashes
fn normalize_path(path: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();

    for segment in path.split('/') {
        match segment {
            "" | "." => continue,
            ".." => {
                segments.pop();
            }
            _ => segments.push(segment),
        }
    }

    if segments.is_empty() {
        return "/".to_string();
    }

    format!("/{}", segments.join("/"))
}

/// Filters out tracking parameters and sorts remaining query parameters
fn filter_and_sort_query_params(url: &Url) -> Vec<(String, String)> {
    let mut params: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| !is_tracking_param(key))
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

    params.sort();
    params
}

/// Checks if a query parameter is a tracking parameter
fn is_tracking_param(key: &str) -> bool {
    TRACKING_PARAMS.contains(&key) || key.starts_with("utm_")
}
