//! Queryable markup documents
//!
//! The extractor only needs "find elements by selector, read their text or
//! an attribute". `Queryable` captures exactly that; `HtmlDocument` is the
//! `scraper` implementation used in production.

use crate::{ConfigError, ConfigResult};
use scraper::{ElementRef, Html, Selector};

/// Selector-based read access to a parsed document
///
/// Selectors are compiled once by the caller with [`compile_selector`] and
/// reused for every page.
pub trait Queryable {
    /// Whitespace-collapsed text of every element matching `selector`
    fn texts(&self, selector: &Selector) -> Vec<String>;

    /// Values of `attr` on every matching element that carries it
    fn attrs(&self, selector: &Selector, attr: &str) -> Vec<String>;

    /// For every element matching `selector`, the texts of its descendants
    /// matching `inner`
    fn nested_texts(&self, selector: &Selector, inner: &Selector) -> Vec<Vec<String>>;

    /// First non-empty text matching `selector`
    fn first_text(&self, selector: &Selector) -> Option<String> {
        self.texts(selector).into_iter().find(|text| !text.is_empty())
    }
}

/// Parses a CSS selector
pub fn compile_selector(selector: &str) -> ConfigResult<Selector> {
    Selector::parse(selector).map_err(|e| ConfigError::InvalidSelector {
        selector: selector.to_string(),
        message: format!("{:?}", e),
    })
}

/// An HTML document parsed with `scraper`
///
/// Parsing never fails: html5ever recovers from any input, so empty or
/// non-HTML markup simply yields a document with no matches.
pub struct HtmlDocument {
    html: Html,
}

impl HtmlDocument {
    /// Parses a full HTML document
    pub fn parse(markup: &str) -> Self {
        Self {
            html: Html::parse_document(markup),
        }
    }
}

impl Queryable for HtmlDocument {
    fn texts(&self, selector: &Selector) -> Vec<String> {
        self.html.select(selector).map(element_text).collect()
    }

    fn attrs(&self, selector: &Selector, attr: &str) -> Vec<String> {
        self.html
            .select(selector)
            .filter_map(|element| element.value().attr(attr))
            .map(|value| value.trim().to_string())
            .collect()
    }

    fn nested_texts(&self, selector: &Selector, inner: &Selector) -> Vec<Vec<String>> {
        self.html
            .select(selector)
            .map(|element| element.select(inner).map(element_text).collect())
            .collect()
    }
}

/// Concatenates an element's text nodes and collapses runs of whitespace
///
/// Inline markup inside a word (`Bak<b>ı</b>`) must not split it.
fn element_text(element: ElementRef<'_>) -> String {
    collapse_whitespace(&element.text().collect::<String>())
}

/// Collapses any whitespace run to a single space and trims the ends
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
