use serde::Deserialize;

/// Main configuration structure for Villa-Sweep
///
/// Every section and key is optional; a missing config file is equivalent to
/// an empty one.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub crawler: CrawlerConfig,
    #[serde(default)]
    pub fetcher: FetcherConfig,
    #[serde(default, rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub site: SiteConfig,
}

/// Crawl scope and scheduling configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct CrawlerConfig {
    /// Search-results URL; `{page}` is substituted if present, otherwise the
    /// page query parameter is set
    pub search_url: Option<String>,

    /// Query parameter carrying the page number
    pub page_param: String,

    /// Upper bound on the number of search pages visited
    pub max_pages: Option<u32>,

    /// Page count assumed when the pagination control cannot be read
    pub fallback_page_count: u32,

    /// Maximum number of requests in flight at once
    pub max_concurrent: u32,

    /// Minimum spacing between request launches (seconds)
    pub delay_seconds: f64,

    /// Number of work items queued per batch
    pub batch_size: u32,

    /// Completed records between automatic checkpoints
    pub checkpoint_interval: u32,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            search_url: None,
            page_param: "page".to_string(),
            max_pages: None,
            fallback_page_count: 1,
            max_concurrent: 15,
            delay_seconds: 0.1,
            batch_size: 50,
            checkpoint_interval: 100,
        }
    }
}

/// Backoff shape applied between retries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BackoffKind {
    Fixed,
    Exponential,
}

/// HTTP fetch behaviour
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct FetcherConfig {
    /// Total request timeout (seconds)
    pub timeout_seconds: u64,

    /// Connection establishment timeout (seconds)
    pub connect_timeout_seconds: u64,

    /// Retries allowed after the first attempt
    pub max_retries: u32,

    pub backoff: BackoffKind,

    /// First backoff delay (milliseconds)
    pub backoff_base_ms: u64,

    /// Ceiling for any single backoff delay (milliseconds)
    pub backoff_max_ms: u64,

    /// Factor applied to the backoff after an HTTP 429
    pub rate_limit_multiplier: u32,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: 30,
            connect_timeout_seconds: 10,
            max_retries: 3,
            backoff: BackoffKind::Exponential,
            backoff_base_ms: 500,
            backoff_max_ms: 30_000,
            rate_limit_multiplier: 4,
        }
    }
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct UserAgentConfig {
    /// Name of the crawler
    pub crawler_name: String,

    /// Version of the crawler
    pub crawler_version: String,

    /// URL with information about the crawler
    pub contact_url: String,

    /// Email address for crawler-related contact
    pub contact_email: String,
}

impl Default for UserAgentConfig {
    fn default() -> Self {
        Self {
            crawler_name: "VillaSweep".to_string(),
            crawler_version: env!("CARGO_PKG_VERSION").to_string(),
            contact_url: "https://example.com/villa-sweep".to_string(),
            contact_email: "crawler@example.com".to_string(),
        }
    }
}

impl UserAgentConfig {
    /// Formats the identifier as `Name/Version (+ContactURL; ContactEmail)`
    pub fn header_value(&self) -> String {
        format!(
            "{}/{} (+{}; {})",
            self.crawler_name, self.crawler_version, self.contact_url, self.contact_email
        )
    }
}

/// Output locations
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct OutputConfig {
    pub csv_path: String,
    pub xlsx_path: String,
    pub checkpoint_path: String,
    pub log_path: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self::with_prefix("villa_listings")
    }
}

impl OutputConfig {
    /// Derives every artifact path from a common prefix
    pub fn with_prefix(prefix: &str) -> Self {
        Self {
            csv_path: format!("{}.csv", prefix),
            xlsx_path: format!("{}.xlsx", prefix),
            checkpoint_path: format!("{}.checkpoint.csv", prefix),
            log_path: "villa_sweep.log".to_string(),
        }
    }
}

/// Site-specific markup table
///
/// Selectors and vocabularies are kept here rather than in code because the
/// live site's markup changes independently of the crawler.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct SiteConfig {
    /// Anchors considered when collecting listing links
    pub listing_link_selector: String,

    /// A listing path contains at least one of these markers
    pub listing_path_markers: Vec<String>,

    /// Paths starting with any of these are never listings
    pub excluded_path_prefixes: Vec<String>,

    /// Anchors of the pagination control
    pub pagination_selector: String,

    pub title_selector: String,
    pub price_selector: String,
    pub address_selector: String,
    pub description_selector: String,
    pub phone_selector: String,
    pub owner_selector: String,

    /// Rows of the two-column attribute table
    pub attribute_row_selector: String,

    /// Block holding the listing date and view counter
    pub meta_selector: String,

    /// Marker preceding the numeric listing id in the title
    pub id_marker: String,
    pub date_label: String,
    pub views_label: String,

    pub phone_country_code: String,
    pub national_number_length: usize,

    #[serde(default)]
    pub labels: AttributeLabels,

    pub agent_markers: Vec<String>,
    pub owner_markers: Vec<String>,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            listing_link_selector: "a[href]".to_string(),
            listing_path_markers: strings(&["satilir-", "kiraye-"]),
            excluded_path_prefixes: strings(&["/search"]),
            pagination_selector: ".pagination a".to_string(),
            title_selector: "h1.elan-single-wrapper-top--title".to_string(),
            price_selector: "div.elan-single-wrapper-top--price".to_string(),
            address_selector: "div.elan-single-content--address span".to_string(),
            description_selector: "div.elan-single-description".to_string(),
            phone_selector: "ul.elan-single-owner-phon-list li a".to_string(),
            owner_selector: "ul.elan-single-owner-info li".to_string(),
            attribute_row_selector: "table.table-info-1 tr".to_string(),
            meta_selector: "table.table-info-2".to_string(),
            id_marker: "ID #".to_string(),
            date_label: "Tarix:".to_string(),
            views_label: "Baxış sayı:".to_string(),
            phone_country_code: "994".to_string(),
            national_number_length: 9,
            labels: AttributeLabels::default(),
            agent_markers: strings(&["agent", "vasitəçi", "rieltor", "daşınmaz əmlak"]),
            owner_markers: strings(&["mülkiyyətçi", "sahibkar", "ev sahibi", "owner"]),
        }
    }
}

/// Attribute-table labels recognised for each record field
///
/// Matching is case-insensitive on the label text with any trailing colon
/// removed.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct AttributeLabels {
    pub country: Vec<String>,
    pub city: Vec<String>,
    pub category: Vec<String>,
    pub area: Vec<String>,
    pub land_area: Vec<String>,
    pub rooms: Vec<String>,
    pub floor: Vec<String>,
    pub document: Vec<String>,
}

impl Default for AttributeLabels {
    fn default() -> Self {
        Self {
            country: strings(&["Ölkə"]),
            city: strings(&["Şəhər", "Rayon", "Region"]),
            category: strings(&["Kateqoriya"]),
            area: strings(&["Sahə", "Sahəsi"]),
            land_area: strings(&["Torpaq sahəsi", "Torpaq"]),
            rooms: strings(&["Otaq sayı", "Otaq"]),
            floor: strings(&["Mərtəbə"]),
            document: strings(&["Sənəd", "Sənədin tipi", "Çıxarış"]),
        }
    }
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}
