//! Fixed export row layout
//!
//! The CSV export, the XLSX export and the checkpoint all share this column
//! set, so a checkpoint can be read back into records.

use crate::extract::{Area, AreaUnit, OwnerType, Parsed, PropertyKind, Record, UNKNOWN};
use crate::output::{OutputError, OutputResult};
use crate::state::RecordStatus;
use chrono::{DateTime, Utc};

/// Export header, in column order
pub const EXPORT_COLUMNS: &[&str] = &[
    "id",
    "url",
    "source_page",
    "page_position",
    "status",
    "complete",
    "title",
    "price_raw",
    "price",
    "currency",
    "listing_date",
    "view_count",
    "country",
    "city",
    "category",
    "property_kind",
    "area_raw",
    "area",
    "area_unit",
    "land_area_raw",
    "land_area",
    "land_area_unit",
    "rooms_raw",
    "rooms",
    "floor",
    "document_type",
    "address",
    "description",
    "phones",
    "owner_name",
    "owner_type",
    "other_attributes",
    "fetched_at",
];

const PHONE_SEPARATOR: &str = ", ";
const ATTRIBUTE_SEPARATOR: &str = "; ";

/// One exported cell
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Text(String),
    Number(f64),
}

impl Cell {
    /// The cell as it appears in the CSV export
    pub fn as_text(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Number(n) => n.to_string(),
        }
    }
}

fn text(value: impl Into<String>) -> Cell {
    Cell::Text(value.into())
}

fn opt_text(value: Option<&str>) -> Cell {
    text(value.unwrap_or(UNKNOWN))
}

fn opt_number(value: Option<f64>) -> Cell {
    value.map(Cell::Number).unwrap_or_else(|| text(UNKNOWN))
}

/// Renders a record as one export row
pub fn record_to_row(record: &Record) -> Vec<Cell> {
    let area_cells = |area: &Parsed<Area>| {
        [
            opt_text(area.raw.as_deref()),
            opt_number(area.value.map(|a| a.value)),
            opt_text(area.value.map(|a| a.unit.as_str())),
        ]
    };

    let phones = if record.phones.is_empty() {
        UNKNOWN.to_string()
    } else {
        record.phones.join(PHONE_SEPARATOR)
    };

    let other_attributes = if record.other_attributes.is_empty() {
        UNKNOWN.to_string()
    } else {
        record
            .other_attributes
            .iter()
            .map(|(key, value)| format!("{}={}", key, value))
            .collect::<Vec<_>>()
            .join(ATTRIBUTE_SEPARATOR)
    };

    let mut row = vec![
        text(record.id.as_str()),
        text(record.url.as_str()),
        Cell::Number(record.source_page as f64),
        Cell::Number(record.page_position as f64),
        text(record.status.to_export_string()),
        text(record.complete.to_string()),
        opt_text(record.title.as_deref()),
        opt_text(record.price.raw.as_deref()),
        opt_number(record.price.value),
        opt_text(record.currency.as_deref()),
        opt_text(record.listing_date.as_deref()),
        opt_number(record.view_count.map(|v| v as f64)),
        opt_text(record.country.as_deref()),
        opt_text(record.city.as_deref()),
        opt_text(record.category.as_deref()),
        text(record.property_kind.as_str()),
    ];
    row.extend(area_cells(&record.area));
    row.extend(area_cells(&record.land_area));
    row.extend([
        opt_text(record.rooms.raw.as_deref()),
        opt_number(record.rooms.value.map(f64::from)),
        opt_text(record.floor.as_deref()),
        opt_text(record.document_type.as_deref()),
        opt_text(record.address.as_deref()),
        opt_text(record.description.as_deref()),
        text(phones),
        opt_text(record.owner_name.as_deref()),
        text(record.owner_type.as_str()),
        text(other_attributes),
        text(record.fetched_at.to_rfc3339()),
    ]);

    row
}

/// Reads a record back from a row written by [`record_to_row`]
pub fn record_from_row(row: &[String]) -> OutputResult<Record> {
    if row.len() != EXPORT_COLUMNS.len() {
        return Err(OutputError::Format(format!(
            "expected {} columns, found {}",
            EXPORT_COLUMNS.len(),
            row.len()
        )));
    }

    let col = |name: &str| column(row, name);
    let known = |name: &str| known_value(row, name);
    let number = |name: &str| number_value(row, name);
    let area = |raw: &str, value: &str, unit: &str| area_value(row, raw, value, unit);

    let url = col("url");
    if url.is_empty() || url == UNKNOWN {
        return Err(OutputError::Format("row without url".to_string()));
    }

    let status = RecordStatus::from_export_str(col("status"))
        .ok_or_else(|| OutputError::Format(format!("unknown status '{}'", col("status"))))?;
    let fetched_at = DateTime::parse_from_rfc3339(col("fetched_at"))
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| OutputError::Format(format!("bad fetched_at: {}", e)))?;

    let mut record = Record::new(url, status);
    record.id = known("id").unwrap_or(record.id);
    record.source_page = number("source_page").map(|n| n as u32).unwrap_or(0);
    record.page_position = number("page_position").map(|n| n as u32).unwrap_or(0);
    record.complete = col("complete") == "true";
    record.title = known("title");
    record.price = Parsed {
        raw: known("price_raw"),
        value: number("price"),
    };
    record.currency = known("currency");
    record.listing_date = known("listing_date");
    record.view_count = number("view_count").map(|n| n as u64);
    record.country = known("country");
    record.city = known("city");
    record.category = known("category");
    record.property_kind = PropertyKind::parse(col("property_kind"));
    record.area = area("area_raw", "area", "area_unit");
    record.land_area = area("land_area_raw", "land_area", "land_area_unit");
    record.rooms = Parsed {
        raw: known("rooms_raw"),
        value: number("rooms").map(|n| n as u32),
    };
    record.floor = known("floor");
    record.document_type = known("document_type");
    record.address = known("address");
    record.description = known("description");
    record.phones = known("phones")
        .map(|p| p.split(PHONE_SEPARATOR).map(str::to_string).collect())
        .unwrap_or_default();
    record.owner_name = known("owner_name");
    record.owner_type = OwnerType::parse(col("owner_type"));
    record.other_attributes = known("other_attributes")
        .map(|attrs| {
            attrs
                .split(ATTRIBUTE_SEPARATOR)
                .filter_map(|pair| pair.split_once('='))
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect()
        })
        .unwrap_or_default();
    record.fetched_at = fetched_at;

    Ok(record)
}

fn column<'a>(row: &'a [String], name: &str) -> &'a str {
    EXPORT_COLUMNS
        .iter()
        .position(|c| *c == name)
        .and_then(|i| row.get(i))
        .map(String::as_str)
        .unwrap_or(UNKNOWN)
}

fn known_value(row: &[String], name: &str) -> Option<String> {
    let value = column(row, name);
    (value != UNKNOWN && !value.is_empty()).then(|| value.to_string())
}

fn number_value(row: &[String], name: &str) -> Option<f64> {
    known_value(row, name).and_then(|v| v.parse::<f64>().ok())
}

fn area_value(row: &[String], raw: &str, value: &str, unit: &str) -> Parsed<Area> {
    Parsed {
        raw: known_value(row, raw),
        value: number_value(row, value).and_then(|value| {
            known_value(row, unit)
                .and_then(|u| AreaUnit::parse(&u))
                .map(|unit| Area { value, unit })
        }),
    }
}
