//! Phone number normalization
//!
//! A contact block may hold several numbers in one string with arbitrary
//! punctuation. Numbers are split on list separators, reduced to digits, and
//! digit runs that hold more than one number are cut at country-code and
//! trunk-prefix boundaries.

/// Separators that always end one phone number
const LIST_SEPARATORS: &[char] = &[',', ';', '|', '/', '\n', '\r', '\t'];

/// Shortest digit run still treated as a (local) phone number
const MIN_LOCAL_DIGITS: usize = 7;

/// Numbering plan used to find boundaries between concatenated numbers
#[derive(Debug, Clone)]
pub struct PhoneRules {
    /// Country calling code without `+`, e.g. `994`
    pub country_code: String,

    /// Digits after the country code or trunk `0`, e.g. 9
    pub national_length: usize,
}

impl PhoneRules {
    pub fn new(country_code: &str, national_length: usize) -> Self {
        Self {
            country_code: country_code.to_string(),
            national_length,
        }
    }

    /// Length of the number starting at the front of `digits`, if any
    fn next_number_len(&self, digits: &str) -> Option<usize> {
        let international = self.country_code.len() + self.national_length;
        let trunk = 1 + self.national_length;

        if !self.country_code.is_empty()
            && digits.starts_with(&self.country_code)
            && digits.len() >= international
        {
            Some(international)
        } else if digits.starts_with('0') && digits.len() >= trunk {
            Some(trunk)
        } else if digits.len() >= self.national_length {
            Some(self.national_length)
        } else if digits.len() >= MIN_LOCAL_DIGITS {
            Some(digits.len())
        } else {
            None
        }
    }

    /// Key under which two spellings of one number compare equal
    fn dedup_key<'a>(&self, number: &'a str) -> &'a str {
        let len = number.len();
        if len > self.national_length {
            &number[len - self.national_length..]
        } else {
            number
        }
    }
}

impl Default for PhoneRules {
    fn default() -> Self {
        Self::new("994", 9)
    }
}

/// Splits and normalizes every phone number in `blob`
///
/// Each number is returned digits-only. Numbers that differ only by country
/// code or trunk prefix are duplicates; the first spelling seen is kept and
/// first-seen order is preserved.
///
/// # Examples
///
/// ```
/// use villa_sweep::extract::{normalize_phones, PhoneRules};
///
/// let phones = normalize_phones("+994 50 123-45-67, 050 987 65 43", &PhoneRules::default());
/// assert_eq!(phones, vec!["994501234567", "0509876543"]);
/// ```
pub fn normalize_phones(blob: &str, rules: &PhoneRules) -> Vec<String> {
    let mut numbers: Vec<String> = Vec::new();
    let mut seen_keys: Vec<String> = Vec::new();

    for chunk in blob.split(LIST_SEPARATORS) {
        let digits: String = chunk.chars().filter(|c| c.is_ascii_digit()).collect();

        let mut rest = digits.as_str();
        while let Some(len) = rules.next_number_len(rest) {
            let (number, tail) = rest.split_at(len);
            let key = rules.dedup_key(number);
            if !seen_keys.iter().any(|seen| seen == key) {
                seen_keys.push(key.to_string());
                numbers.push(number.to_string());
            }
            rest = tail;
        }
    }

    numbers
}
