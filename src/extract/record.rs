//! Structured listing record
//!
//! Every field except `id` and `url` is optional. Absent values are rendered
//! as [`UNKNOWN`] at export time so the table shape never varies by row.

use crate::state::RecordStatus;
use crate::url::{fallback_listing_id, listing_id_from_url};
use chrono::{DateTime, Utc};
use std::fmt;
use url::Url;

/// Sentinel written for any value that could not be extracted
pub const UNKNOWN: &str = "unknown";

/// A value kept alongside the raw text it was parsed from
///
/// When parsing fails the raw text survives and `value` stays `None`.
#[derive(Debug, Clone, PartialEq)]
pub struct Parsed<T> {
    pub raw: Option<String>,
    pub value: Option<T>,
}

impl<T> Default for Parsed<T> {
    fn default() -> Self {
        Self {
            raw: None,
            value: None,
        }
    }
}

impl<T> Parsed<T> {
    /// Parses `raw` with `parse`, keeping the raw text either way
    pub fn from_raw(raw: Option<String>, parse: impl FnOnce(&str) -> Option<T>) -> Self {
        let value = raw.as_deref().and_then(parse);
        Self { raw, value }
    }
}

/// Unit of an area measurement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AreaUnit {
    SquareMeters,
    /// Regional land unit, one hundredth of a hectare
    Sot,
}

impl AreaUnit {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SquareMeters => "m2",
            Self::Sot => "sot",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "m2" => Some(Self::SquareMeters),
            "sot" => Some(Self::Sot),
            _ => None,
        }
    }
}

/// An area value with its unit
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Area {
    pub value: f64,
    pub unit: AreaUnit,
}

/// Coarse property classification derived from the category text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PropertyKind {
    Villa,
    Apartment,
    Land,
    Other,
    Unknown,
}

const VILLA_KEYWORDS: &[&str] = &["villa", "bağ evi", "həyət evi", "house", "kottec"];
const APARTMENT_KEYWORDS: &[&str] = &["mənzil", "tikili", "apartment", "flat"];
const LAND_KEYWORDS: &[&str] = &["torpaq", "land"];

impl PropertyKind {
    /// Classifies free-text category labels through a keyword table
    pub fn classify(category: Option<&str>) -> Self {
        let Some(category) = category.map(str::trim).filter(|c| !c.is_empty()) else {
            return Self::Unknown;
        };
        let lower = category.to_lowercase();
        let has_any = |words: &[&str]| words.iter().any(|w| lower.contains(w));

        if has_any(VILLA_KEYWORDS) {
            Self::Villa
        } else if has_any(APARTMENT_KEYWORDS) {
            Self::Apartment
        } else if has_any(LAND_KEYWORDS) {
            Self::Land
        } else {
            Self::Other
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Villa => "villa",
            Self::Apartment => "apartment",
            Self::Land => "land",
            Self::Other => "other",
            Self::Unknown => UNKNOWN,
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "villa" => Self::Villa,
            "apartment" => Self::Apartment,
            "land" => Self::Land,
            "other" => Self::Other,
            _ => Self::Unknown,
        }
    }
}

/// Who published the listing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OwnerType {
    Agent,
    Owner,
    Unknown,
}

impl OwnerType {
    /// Infers the owner type from marker vocabularies
    ///
    /// The first text containing any marker decides; agent markers are
    /// checked before owner markers.
    pub fn infer<'a>(
        texts: impl IntoIterator<Item = &'a str>,
        agent_markers: &[String],
        owner_markers: &[String],
    ) -> Self {
        for text in texts {
            let lower = text.to_lowercase();
            if agent_markers
                .iter()
                .any(|m| lower.contains(&m.to_lowercase()))
            {
                return Self::Agent;
            }
            if owner_markers
                .iter()
                .any(|m| lower.contains(&m.to_lowercase()))
            {
                return Self::Owner;
            }
        }
        Self::Unknown
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Agent => "agent",
            Self::Owner => "owner",
            Self::Unknown => UNKNOWN,
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "agent" => Self::Agent,
            "owner" => Self::Owner,
            _ => Self::Unknown,
        }
    }
}

/// One listing's extracted data
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    // Identity
    pub id: String,
    pub url: String,

    // Position in the crawl, used for the export ordering
    pub source_page: u32,
    pub page_position: u32,

    pub status: RecordStatus,
    /// True when every core field was extracted
    pub complete: bool,

    // Commercial
    pub title: Option<String>,
    pub price: Parsed<f64>,
    pub currency: Option<String>,
    pub listing_date: Option<String>,
    pub view_count: Option<u64>,

    // Property attributes
    pub country: Option<String>,
    pub city: Option<String>,
    pub category: Option<String>,
    pub property_kind: PropertyKind,
    pub area: Parsed<Area>,
    pub land_area: Parsed<Area>,
    pub rooms: Parsed<u32>,
    pub floor: Option<String>,
    pub document_type: Option<String>,

    // Location and text
    pub address: Option<String>,
    pub description: Option<String>,

    // Contact
    pub phones: Vec<String>,
    pub owner_name: Option<String>,
    pub owner_type: OwnerType,

    /// Attribute-table rows that matched no known label, in page order
    pub other_attributes: Vec<(String, String)>,

    pub fetched_at: DateTime<Utc>,
}

impl Record {
    /// Creates a record with only identity set and every other field unknown
    ///
    /// The id comes from the URL's trailing number, or a hash of the URL
    /// when it has none.
    pub fn new(url: &str, status: RecordStatus) -> Self {
        let id = Url::parse(url)
            .ok()
            .and_then(|parsed| listing_id_from_url(&parsed))
            .unwrap_or_else(|| fallback_listing_id(url));

        Self {
            id,
            url: url.to_string(),
            source_page: 0,
            page_position: 0,
            status,
            complete: false,
            title: None,
            price: Parsed::default(),
            currency: None,
            listing_date: None,
            view_count: None,
            country: None,
            city: None,
            category: None,
            property_kind: PropertyKind::Unknown,
            area: Parsed::default(),
            land_area: Parsed::default(),
            rooms: Parsed::default(),
            floor: None,
            document_type: None,
            address: None,
            description: None,
            phones: Vec::new(),
            owner_name: None,
            owner_type: OwnerType::Unknown,
            other_attributes: Vec::new(),
            fetched_at: Utc::now(),
        }
    }

    /// A minimal record for a listing whose fetch failed terminally
    pub fn failed(url: &str, reason: impl Into<String>) -> Self {
        Self::new(url, RecordStatus::Failed(reason.into()))
    }

    /// A minimal record for a listing that was never fetched because the run
    /// was cancelled
    pub fn cancelled(url: &str) -> Self {
        Self::new(url, RecordStatus::Cancelled)
    }

    /// Tags the record with where the listing was discovered
    pub fn at_position(mut self, source_page: u32, page_position: u32) -> Self {
        self.source_page = source_page;
        self.page_position = page_position;
        self
    }

    /// Recomputes the completeness flag from the core fields
    pub fn refresh_completeness(&mut self) {
        self.complete = self.status.is_ok()
            && self.title.is_some()
            && self.price.value.is_some()
            && self.city.is_some()
            && self.category.is_some()
            && self.area.value.is_some()
            && !self.phones.is_empty();
    }

    /// Sort key of the export: source page, then discovery order, then URL
    pub fn order_key(&self) -> (u32, u32, &str) {
        (self.source_page, self.page_position, self.url.as_str())
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.id, self.url)
    }
}
