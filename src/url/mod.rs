//! URL handling module for Villa-Sweep
//!
//! This module renders search-page URLs, recognises and normalizes listing
//! links, and derives stable listing ids from listing URLs.

mod matcher;
mod normalize;
mod search;

pub use matcher::ListingMatcher;
pub use normalize::normalize_listing_url;
pub use search::SearchTemplate;

use regex::Regex;
use sha2::{Digest, Sha256};
use std::sync::OnceLock;
use url::Url;

/// Extracts the numeric id most listing sites append to the final path segment
///
/// # Examples
///
/// ```
/// use url::Url;
/// use villa_sweep::url::listing_id_from_url;
///
/// let url = Url::parse("https://villa.az/satilir-villa-mardakan-48213").unwrap();
/// assert_eq!(listing_id_from_url(&url), Some("48213".to_string()));
/// ```
pub fn listing_id_from_url(url: &Url) -> Option<String> {
    static TRAILING_ID: OnceLock<Regex> = OnceLock::new();
    let re = TRAILING_ID.get_or_init(|| {
        Regex::new(r"(\d{3,})(?:\.html?)?$").expect("trailing id pattern is valid")
    });

    let last_segment = url.path_segments()?.filter(|s| !s.is_empty()).last()?;
    re.captures(last_segment).map(|caps| caps[1].to_string())
}

/// Lowercased host without a leading `www.`
pub(crate) fn bare_host(host: &str) -> String {
    let host = host.to_lowercase();
    match host.strip_prefix("www.") {
        Some(rest) => rest.to_string(),
        None => host,
    }
}

/// Derives a stable id for a URL that carries no numeric id
///
/// The first 16 hex characters of the SHA-256 of the URL, so the same
/// listing always maps to the same id across runs.
pub fn fallback_listing_id(url: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(url.as_bytes());
    let digest = hex::encode(hasher.finalize());
    format!("u{}", &digest[..16])
}
