//! Listing extraction
//!
//! Turns one listing page's markup into a [`Record`]. Extraction never fails:
//! live-site markup is unreliable, so a missing or malformed field leaves
//! that field unknown and clears the completeness flag instead of aborting.
//!
//! All site-specific knowledge (selectors, label vocabularies, marker
//! strings) comes from [`SiteConfig`].

mod document;
mod numbers;
mod phones;
mod record;

pub use document::{collapse_whitespace, compile_selector, HtmlDocument, Queryable};
pub use numbers::{detect_area_unit, detect_currency, parse_area, parse_count, parse_number};
pub use phones::{normalize_phones, PhoneRules};
pub use record::{Area, AreaUnit, OwnerType, Parsed, PropertyKind, Record, UNKNOWN};

use crate::config::SiteConfig;
use crate::state::RecordStatus;
use crate::ConfigResult;
use regex::Regex;
use scraper::Selector;

/// Extracts structured records from listing markup
pub struct Extractor {
    site: SiteConfig,
    selectors: Selectors,
    phone_rules: PhoneRules,
    id_pattern: Option<Regex>,
    date_pattern: Option<Regex>,
    views_pattern: Option<Regex>,
}

/// The site's selectors, compiled once per extractor
struct Selectors {
    title: Selector,
    price: Selector,
    address: Selector,
    description: Selector,
    phone: Selector,
    owner: Selector,
    owner_link: Selector,
    attribute_row: Selector,
    attribute_cell: Selector,
    meta: Selector,
}

impl Selectors {
    fn compile(site: &SiteConfig) -> ConfigResult<Self> {
        Ok(Self {
            title: compile_selector(&site.title_selector)?,
            price: compile_selector(&site.price_selector)?,
            address: compile_selector(&site.address_selector)?,
            description: compile_selector(&site.description_selector)?,
            phone: compile_selector(&site.phone_selector)?,
            owner: compile_selector(&site.owner_selector)?,
            owner_link: compile_selector("a")?,
            attribute_row: compile_selector(&site.attribute_row_selector)?,
            attribute_cell: compile_selector("th, td")?,
            meta: compile_selector(&site.meta_selector)?,
        })
    }
}

/// Attribute-table values sorted into record fields
#[derive(Default)]
struct Attributes {
    country: Option<String>,
    city: Option<String>,
    category: Option<String>,
    area: Option<String>,
    land_area: Option<String>,
    rooms: Option<String>,
    floor: Option<String>,
    document: Option<String>,
    other: Vec<(String, String)>,
}

impl Extractor {
    /// Creates an extractor for the given site markup table
    ///
    /// Fails if any configured selector does not parse.
    pub fn new(site: SiteConfig) -> ConfigResult<Self> {
        let selectors = Selectors::compile(&site)?;
        let phone_rules = PhoneRules::new(&site.phone_country_code, site.national_number_length);
        let id_pattern = label_pattern(&site.id_marker, r"(\d+)");
        let date_pattern = label_pattern(&site.date_label, r"(\d{1,2}[-./]\d{1,2}[-./]\d{2,4})");
        let views_pattern = label_pattern(&site.views_label, r"(\d[\d\s]*)");

        Ok(Self {
            site,
            selectors,
            phone_rules,
            id_pattern,
            date_pattern,
            views_pattern,
        })
    }

    /// Extracts a record from raw markup
    ///
    /// `source_url` always becomes the record's `url`, and its id when the
    /// page does not state one, so the identity fields are never empty.
    pub fn extract(&self, markup: &str, source_url: &str) -> Record {
        let document = HtmlDocument::parse(markup);
        self.extract_from(&document, source_url)
    }

    /// Extracts a record from any queryable document
    pub fn extract_from(&self, doc: &impl Queryable, source_url: &str) -> Record {
        let site = &self.site;
        let selectors = &self.selectors;
        let mut record = Record::new(source_url, RecordStatus::Ok);

        record.title = doc.first_text(&selectors.title);
        if let Some(id) = record.title.as_deref().and_then(|t| self.capture(&self.id_pattern, t)) {
            record.id = id;
        }

        let price_raw = doc.first_text(&selectors.price);
        record.currency = price_raw.as_deref().and_then(detect_currency);
        record.price = Parsed::from_raw(price_raw, parse_number);

        let attributes = self.attributes(doc);
        record.property_kind = PropertyKind::classify(attributes.category.as_deref());
        record.country = attributes.country;
        record.city = attributes.city;
        record.category = attributes.category;
        record.area = Parsed::from_raw(attributes.area, |raw| {
            parse_area(raw, AreaUnit::SquareMeters)
        });
        record.land_area = Parsed::from_raw(attributes.land_area, |raw| {
            parse_area(raw, AreaUnit::Sot)
        });
        record.rooms = Parsed::from_raw(attributes.rooms, parse_count);
        record.floor = attributes.floor;
        record.document_type = attributes.document;
        record.other_attributes = attributes.other;

        // The first span of the address block is its label
        let address_spans = doc.texts(&selectors.address);
        record.address = address_spans.get(1).filter(|a| !a.is_empty()).cloned();
        record.description = doc.first_text(&selectors.description);

        record.phones = self.phones(doc);

        let owner_items = doc.texts(&selectors.owner);
        record.owner_name = doc
            .nested_texts(&selectors.owner, &selectors.owner_link)
            .into_iter()
            .next()
            .and_then(|links| links.into_iter().find(|name| !name.is_empty()));
        record.owner_type = OwnerType::infer(
            owner_items.iter().map(String::as_str),
            &site.agent_markers,
            &site.owner_markers,
        );

        let meta = doc.texts(&selectors.meta).join(" ");
        record.listing_date = self.capture(&self.date_pattern, &meta);
        record.view_count = self
            .capture(&self.views_pattern, &meta)
            .and_then(|views| parse_count(&views))
            .map(u64::from);

        record.refresh_completeness();
        record
    }

    /// Sorts the two-column attribute table into fields by label
    fn attributes(&self, doc: &impl Queryable) -> Attributes {
        let labels = &self.site.labels;
        let mut attributes = Attributes::default();

        for cells in doc.nested_texts(
            &self.selectors.attribute_row,
            &self.selectors.attribute_cell,
        ) {
            let [label, value] = cells.as_slice() else {
                continue;
            };
            let label = label.trim().trim_end_matches(':').trim();
            if label.is_empty() || value.is_empty() {
                continue;
            }

            let slot = if label_matches(label, &labels.country) {
                &mut attributes.country
            } else if label_matches(label, &labels.city) {
                &mut attributes.city
            } else if label_matches(label, &labels.category) {
                &mut attributes.category
            } else if label_matches(label, &labels.land_area) {
                &mut attributes.land_area
            } else if label_matches(label, &labels.area) {
                &mut attributes.area
            } else if label_matches(label, &labels.rooms) {
                &mut attributes.rooms
            } else if label_matches(label, &labels.floor) {
                &mut attributes.floor
            } else if label_matches(label, &labels.document) {
                &mut attributes.document
            } else {
                attributes.other.push((label.to_string(), value.clone()));
                continue;
            };

            if slot.is_none() {
                *slot = Some(value.clone());
            }
        }

        attributes
    }

    /// Collects phone numbers from link texts and `tel:` targets
    fn phones(&self, doc: &impl Queryable) -> Vec<String> {
        let selector = &self.selectors.phone;
        let mut parts = doc.texts(selector);
        parts.extend(
            doc.attrs(selector, "href")
                .into_iter()
                .filter_map(|href| href.strip_prefix("tel:").map(str::to_string)),
        );

        normalize_phones(&parts.join(", "), &self.phone_rules)
    }

    fn capture(&self, pattern: &Option<Regex>, text: &str) -> Option<String> {
        let caps = pattern.as_ref()?.captures(text)?;
        let value = collapse_whitespace(caps.get(1)?.as_str());
        Some(value).filter(|v| !v.is_empty())
    }
}

/// Builds `<escaped label>\s*<value>`; an empty label disables the field
fn label_pattern(label: &str, value: &str) -> Option<Regex> {
    let label = label.trim();
    if label.is_empty() {
        return None;
    }
    Regex::new(&format!(r"{}\s*{}", regex::escape(label), value)).ok()
}

fn label_matches(label: &str, candidates: &[String]) -> bool {
    let label = label.to_lowercase();
    candidates
        .iter()
        .any(|candidate| candidate.to_lowercase() == label)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const LISTING_URL: &str = "https://villa.az/satilir-villa-merdekan-48213";

    fn listing_markup() -> String {
        r#"
        <html><body>
          <h1 class="elan-single-wrapper-top--title">Mərdəkanda 5 otaqlı villa ID # 48213</h1>
          <div class="elan-single-wrapper-top--price">350 000 AZN</div>
          <table class="table-info-1">
            <tr><td>Ölkə:</td><td>Azərbaycan</td></tr>
            <tr><td>Şəhər:</td><td>Bakı</td></tr>
            <tr><td>Kateqoriya:</td><td>Bağ evi / Villa</td></tr>
            <tr><td>Sahə:</td><td>320 m²</td></tr>
            <tr><td>Torpaq sahəsi:</td><td>8 sot</td></tr>
            <tr><td>Otaq sayı:</td><td>5</td></tr>
            <tr><td>Mərtəbə:</td><td>2</td></tr>
            <tr><td>Sənəd:</td><td>Kupça</td></tr>
            <tr><td>Hovuz:</td><td>Var</td></tr>
          </table>
          <div class="elan-single-content--address">
            <span>Ünvan:</span><span>Mərdəkan qəs., Sahil küç. 12</span>
          </div>
          <div class="elan-single-description">Dənizə yaxın, hovuzlu villa.</div>
          <ul class="elan-single-owner-phon-list">
            <li><a href="tel:+994501234567">+994 50 123-45-67</a></li>
            <li><a href="tel:0509876543">050 987 65 43</a></li>
          </ul>
          <ul class="elan-single-owner-info">
            <li><a href="/user/12">Rəşad</a></li>
            <li>Vasitəçi (agent)</li>
          </ul>
          <table class="table-info-2">
            <tr><td>Tarix: 12-05-24</td><td>Baxış sayı: 1 345</td></tr>
          </table>
        </body></html>
        "#
        .to_string()
    }

    fn extractor() -> Extractor {
        Extractor::new(SiteConfig::default()).unwrap()
    }

    #[test]
    fn test_full_listing() {
        let record = extractor().extract(&listing_markup(), LISTING_URL);

        assert_eq!(record.id, "48213");
        assert_eq!(record.url, LISTING_URL);
        assert_eq!(
            record.title.as_deref(),
            Some("Mərdəkanda 5 otaqlı villa ID # 48213")
        );
        assert_eq!(record.price.value, Some(350000.0));
        assert_eq!(record.price.raw.as_deref(), Some("350 000 AZN"));
        assert_eq!(record.currency.as_deref(), Some("AZN"));
        assert_eq!(record.country.as_deref(), Some("Azərbaycan"));
        assert_eq!(record.city.as_deref(), Some("Bakı"));
        assert_eq!(record.property_kind, PropertyKind::Villa);
        assert_eq!(
            record.area.value,
            Some(Area {
                value: 320.0,
                unit: AreaUnit::SquareMeters
            })
        );
        assert_eq!(
            record.land_area.value,
            Some(Area {
                value: 8.0,
                unit: AreaUnit::Sot
            })
        );
        assert_eq!(record.rooms.value, Some(5));
        assert_eq!(record.floor.as_deref(), Some("2"));
        assert_eq!(record.document_type.as_deref(), Some("Kupça"));
        assert_eq!(
            record.address.as_deref(),
            Some("Mərdəkan qəs., Sahil küç. 12")
        );
        assert_eq!(record.phones, vec!["994501234567", "0509876543"]);
        assert_eq!(record.owner_name.as_deref(), Some("Rəşad"));
        assert_eq!(record.owner_type, OwnerType::Agent);
        assert_eq!(record.listing_date.as_deref(), Some("12-05-24"));
        assert_eq!(record.view_count, Some(1345));
        assert_eq!(
            record.other_attributes,
            vec![("Hovuz".to_string(), "Var".to_string())]
        );
        assert_eq!(record.status, RecordStatus::Ok);
        assert!(record.complete);
    }

    #[test]
    fn test_unparseable_price_keeps_raw_text() {
        let markup = listing_markup().replace("350 000 AZN", "Razılaşma yolu ilə");
        let record = extractor().extract(&markup, LISTING_URL);

        assert_eq!(record.price.raw.as_deref(), Some("Razılaşma yolu ilə"));
        assert_eq!(record.price.value, None);
        assert!(!record.complete);
    }

    #[test]
    fn test_missing_phones_clear_completeness() {
        let markup = listing_markup().replace("elan-single-owner-phon-list", "gone");
        let record = extractor().extract(&markup, LISTING_URL);

        assert!(record.phones.is_empty());
        assert!(!record.complete);
        assert_eq!(record.city.as_deref(), Some("Bakı"));
    }

    #[test]
    fn test_id_from_url_when_title_has_none() {
        let markup = listing_markup().replace("ID # 48213", "");
        let record = extractor().extract(&markup, "https://villa.az/kiraye-menzil-777");
        assert_eq!(record.id, "777");
    }

    #[test]
    fn test_owner_type_markers() {
        let markup = listing_markup().replace("Vasitəçi (agent)", "Mülkiyyətçi");
        let record = extractor().extract(&markup, LISTING_URL);
        assert_eq!(record.owner_type, OwnerType::Owner);
    }

    #[test]
    fn test_empty_markup() {
        let record = extractor().extract("", LISTING_URL);

        assert_eq!(record.id, "48213");
        assert_eq!(record.url, LISTING_URL);
        assert_eq!(record.title, None);
        assert_eq!(record.owner_type, OwnerType::Unknown);
        assert_eq!(record.property_kind, PropertyKind::Unknown);
        assert!(!record.complete);
    }

    #[test]
    fn test_configured_labels() {
        let mut site = SiteConfig::default();
        site.labels.city = vec!["City".to_string()];
        site.attribute_row_selector = "table.attrs tr".to_string();

        let markup = r#"<table class="attrs"><tr><th>City</th><td>Gəncə</td></tr></table>"#;
        let record = Extractor::new(site).unwrap().extract(markup, LISTING_URL);
        assert_eq!(record.city.as_deref(), Some("Gəncə"));
    }

    #[test]
    fn test_invalid_selector_rejected_at_construction() {
        let mut site = SiteConfig::default();
        site.price_selector = "div[[".to_string();
        assert!(matches!(
            Extractor::new(site),
            Err(crate::ConfigError::InvalidSelector { selector, .. }) if selector == "div[["
        ));
    }

    #[test]
    fn test_inline_markup_inside_value() {
        let markup = r#"<table class="table-info-1">
            <tr><td>Şəhər:</td><td>Bak<b>ı</b></td></tr>
        </table>"#;
        let record = extractor().extract(markup, LISTING_URL);
        assert_eq!(record.city.as_deref(), Some("Bakı"));
    }

    proptest! {
        #[test]
        fn prop_garbage_markup_never_breaks_identity(
            markup in ".{0,400}",
            slug in "[a-z]{1,12}",
            id in 100u32..1_000_000,
        ) {
            let url = format!("https://villa.az/satilir-{}-{}", slug, id);
            let record = extractor().extract(&markup, &url);

            prop_assert_eq!(&record.url, &url);
            prop_assert!(!record.id.is_empty());
            prop_assert_eq!(record.status, RecordStatus::Ok);
        }

        #[test]
        fn prop_tag_soup_is_tolerated(
            fragments in proptest::collection::vec(
                prop_oneof![
                    Just("<table class=\"table-info-1\">".to_string()),
                    Just("<tr><td>".to_string()),
                    Just("</td><td>".to_string()),
                    Just("<ul class=\"elan-single-owner-phon-list\"><li><a>".to_string()),
                    Just("<h1 class=\"elan-single-wrapper-top--title\">".to_string()),
                    "[0-9 ,.:+-]{0,20}",
                    "\\PC{0,20}",
                ],
                0..40,
            ),
        ) {
            let markup = fragments.concat();
            let record = extractor().extract(&markup, LISTING_URL);
            prop_assert_eq!(record.url.as_str(), LISTING_URL);
            prop_assert!(!record.id.is_empty());
        }
    }
}
