//! Tolerant numeric parsing for localized listing text
//!
//! Listing sites mix thousands separators (`125 000`, `1.250.000`,
//! `1,250,000`) with decimal commas (`85,5`). These helpers pull the first
//! numeric token out of free text and interpret its separators; anything
//! they cannot interpret is `None`, never an error.

use crate::extract::record::{Area, AreaUnit};

/// Characters that may sit between digit groups of one number
fn is_group_separator(c: char) -> bool {
    matches!(c, ' ' | '\u{a0}' | '\u{202f}' | '.' | ',' | '\'')
}

/// Extracts the first numeric token from `text` and parses it
///
/// # Examples
///
/// ```
/// use villa_sweep::extract::parse_number;
///
/// assert_eq!(parse_number("125 000 AZN"), Some(125000.0));
/// assert_eq!(parse_number("1.250.000 ₼"), Some(1250000.0));
/// assert_eq!(parse_number("85,5 m²"), Some(85.5));
/// assert_eq!(parse_number("razılaşma ilə"), None);
/// ```
pub fn parse_number(text: &str) -> Option<f64> {
    let token = first_numeric_token(text)?;
    interpret_separators(&token)?.parse::<f64>().ok()
}

/// Parses a whole, non-negative count such as a room number
pub fn parse_count(text: &str) -> Option<u32> {
    let value = parse_number(text)?;
    if value.fract() == 0.0 && value >= 0.0 && value <= u32::MAX as f64 {
        Some(value as u32)
    } else {
        None
    }
}

/// Parses an area, detecting the unit from the text or using `default_unit`
pub fn parse_area(text: &str, default_unit: AreaUnit) -> Option<Area> {
    let value = parse_number(text)?;
    let unit = detect_area_unit(text).unwrap_or(default_unit);
    Some(Area { value, unit })
}

/// Recognises an area unit mentioned in the text
pub fn detect_area_unit(text: &str) -> Option<AreaUnit> {
    let lower = text.to_lowercase();
    if lower.contains("sot") {
        Some(AreaUnit::Sot)
    } else if ["m²", "m2", "kv.m", "kv m", "кв", "м²"]
        .iter()
        .any(|unit| lower.contains(unit))
    {
        Some(AreaUnit::SquareMeters)
    } else {
        None
    }
}

/// Recognises the currency of a price string as an ISO code
pub fn detect_currency(text: &str) -> Option<String> {
    let lower = text.to_lowercase();
    let code = if lower.contains("azn") || lower.contains('₼') || lower.contains("manat") {
        "AZN"
    } else if lower.contains("usd") || lower.contains('$') {
        "USD"
    } else if lower.contains("eur") || lower.contains('€') {
        "EUR"
    } else if lower.contains("rub") || lower.contains('₽') {
        "RUB"
    } else {
        return None;
    };
    Some(code.to_string())
}

/// Returns the first run of digits and in-number separators
///
/// A separator only continues the token when a digit follows it, so the
/// trailing dot of `120.` or the space of `12 sot` ends the number.
fn first_numeric_token(text: &str) -> Option<String> {
    let chars: Vec<char> = text.chars().collect();
    let start = chars.iter().position(|c| c.is_ascii_digit())?;

    let mut token = String::new();
    let mut i = start;
    while i < chars.len() {
        let c = chars[i];
        if c.is_ascii_digit() {
            token.push(c);
        } else if is_group_separator(c)
            && chars.get(i + 1).is_some_and(|next| next.is_ascii_digit())
        {
            token.push(c);
        } else {
            break;
        }
        i += 1;
    }

    Some(token)
}

/// Rewrites a numeric token into a plain `1234.5` form
///
/// - spaces and apostrophes are always thousands separators
/// - with both `.` and `,` present, the last one is the decimal mark
/// - a single kind repeated is a thousands separator
/// - a single occurrence followed by exactly three digits is a thousands
///   separator unless the integer part is `0`; otherwise it is decimal
fn interpret_separators(token: &str) -> Option<String> {
    let compact: String = token
        .chars()
        .filter(|c| !matches!(c, ' ' | '\u{a0}' | '\u{202f}' | '\''))
        .collect();

    let dots = compact.matches('.').count();
    let commas = compact.matches(',').count();

    let normalized = match (dots, commas) {
        (0, 0) => compact,
        (_, 0) | (0, _) => {
            let sep = if dots > 0 { '.' } else { ',' };
            let count = dots + commas;
            if count > 1 {
                compact.replace(sep, "")
            } else {
                let (int_part, frac_part) = compact.split_once(sep)?;
                if frac_part.len() == 3 && int_part != "0" {
                    format!("{}{}", int_part, frac_part)
                } else {
                    format!("{}.{}", int_part, frac_part)
                }
            }
        }
        _ => {
            let last_dot = compact.rfind('.')?;
            let last_comma = compact.rfind(',')?;
            let (decimal, thousands) = if last_dot > last_comma {
                ('.', ',')
            } else {
                (',', '.')
            };
            let without_thousands = compact.replace(thousands, "");
            if without_thousands.matches(decimal).count() > 1 {
                return None;
            }
            without_thousands.replace(decimal, ".")
        }
    };

    Some(normalized)
}
