//! Encoding of the go-live/ETA column.
//!
//! The stored value doubles as the wire value and the display value, so the
//! text layout lives here and nowhere else.

use chrono::{Datelike, NaiveDate};
use regex::Regex;
use std::sync::LazyLock;

/// `chrono` format string for stored eta values.
pub const ETA_FORMAT: &str = "%d/%m/%Y";

/// Exact layout accepted when decoding: two-digit day and month, four-digit year.
static ETA_LAYOUT_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{2}/\d{2}/\d{4}$").unwrap());

/// Whether a date fits the four-digit year of the stored layout.
pub fn is_encodable(date: NaiveDate) -> bool {
    (0..=9999).contains(&date.year())
}

/// Encode a picked date as stored text.
///
/// Only dates for which [`is_encodable`] holds decode back to themselves.
pub fn encode_eta(date: NaiveDate) -> String {
    date.format(ETA_FORMAT).to_string()
}

/// Decode stored text back into a calendar date.
///
/// Returns `None` for blank text, text in any other layout (surrounding
/// whitespace included), or a layout that names an impossible date such as
/// `31/02/2025`.
pub fn decode_eta(text: &str) -> Option<NaiveDate> {
    if !ETA_LAYOUT_REGEX.is_match(text) {
        return None;
    }
    NaiveDate::parse_from_str(text, ETA_FORMAT).ok()
}

/// Re-format stored text for display, or `None` when it does not decode.
pub fn display_eta(text: &str) -> Option<String> {
    decode_eta(text).map(encode_eta)
}
