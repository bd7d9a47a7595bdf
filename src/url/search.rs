use crate::UrlError;
use url::Url;

const PAGE_PLACEHOLDER: &str = "{page}";

/// A search-results URL that can be rendered for any page number
///
/// Templates containing `{page}` have the number substituted in place;
/// otherwise the page query parameter is set, replacing any value already
/// present so `...?page=7` in the configured URL cannot pin every request
/// to page 7.
#[derive(Debug, Clone)]
pub struct SearchTemplate {
    template: String,
    page_param: String,
}

impl SearchTemplate {
    /// Creates a template, failing if page 1 cannot be rendered
    ///
    /// This is the crawl's only up-front URL check: a template that cannot
    /// produce a valid first page aborts the run before any work starts.
    pub fn new(template: &str, page_param: &str) -> Result<Self, UrlError> {
        let search = Self {
            template: template.trim().to_string(),
            page_param: page_param.to_string(),
        };
        search.page_url(1)?;
        Ok(search)
    }

    /// The template as configured
    pub fn as_str(&self) -> &str {
        &self.template
    }

    /// Renders the URL of a 1-based search page
    pub fn page_url(&self, page: u32) -> Result<Url, UrlError> {
        if page == 0 {
            return Err(UrlError::InvalidPage(page));
        }

        if self.template.contains(PAGE_PLACEHOLDER) {
            let rendered = self.template.replace(PAGE_PLACEHOLDER, &page.to_string());
            return parse_http_url(&rendered);
        }

        let mut url = parse_http_url(&self.template)?;
        let kept: Vec<(String, String)> = url
            .query_pairs()
            .filter(|(key, _)| key != self.page_param.as_str())
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();

        url.query_pairs_mut()
            .clear()
            .extend_pairs(kept)
            .append_pair(&self.page_param, &page.to_string());

        Ok(url)
    }
}

fn parse_http_url(raw: &str) -> Result<Url, UrlError> {
    let url = Url::parse(raw).map_err(|e| UrlError::Parse(format!("{}: {}", raw, e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(url.scheme().to_string()));
    }
    if url.host_str().is_none() {
        return Err(UrlError::MissingHost);
    }

    Ok(url)
}
