//! Expiry date extraction from free-text registry responses.
//!
//! WHOIS output has no common schema across registrars. Extraction anchors on a
//! fixed set of expiry labels and then tries a fixed, ordered list of date
//! layouts against the text that follows the label. Dates that are not next to
//! an expiry label are never considered, so creation and update dates cannot be
//! picked up by accident.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use regex::Regex;

/// Canonical on-disk and on-wire date format.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

lazy_static::lazy_static! {
    // Longer labels come first so "expires on" is not cut short by "expires".
    // A bare "expiry"/"expiration" label may be followed by the word "date".
    static ref EXPIRY_PATTERN: Regex = Regex::new(
        r"(?i)\b(registry expiration date|registry expiry date|expiration date|expires on|expiration|expiry|expires|paid-till)\b(?:[ \t]+date\b)?[^0-9A-Za-z]*([0-9A-Za-z ,:/.+\-]+)"
    )
    .expect("expiry pattern is a valid regex");
}

/// A date layout tried against a captured token.
#[derive(Debug, Clone, Copy)]
enum Layout {
    /// Plain calendar date
    Date(&'static str),
    /// RFC 3339 timestamp; the calendar date is taken in the stated offset
    Rfc3339,
    /// RFC 3339 with mandatory fractional seconds
    Rfc3339Fractional,
    /// Date and time without an offset
    DateTime(&'static str),
}

/// Ordered layouts. The first one that parses wins.
const LAYOUTS: &[Layout] = &[
    Layout::Date("%Y-%m-%d"),
    Layout::Date("%Y/%m/%d"),
    Layout::Date("%Y.%m.%d"),
    Layout::Date("%d-%b-%Y"),
    Layout::Date("%b %d, %Y"),
    Layout::Date("%B %d %Y"),
    Layout::Rfc3339,
    Layout::Rfc3339Fractional,
    Layout::DateTime("%Y-%m-%dT%H:%M:%SZ"),
    Layout::DateTime("%Y-%m-%d %H:%M:%S"),
];

impl Layout {
    fn parse(self, token: &str) -> Option<NaiveDate> {
        match self {
            Layout::Date(fmt) => NaiveDate::parse_from_str(token, fmt).ok(),
            Layout::Rfc3339 => DateTime::parse_from_rfc3339(token)
                .ok()
                .map(|dt| dt.date_naive()),
            Layout::Rfc3339Fractional => {
                DateTime::parse_from_str(token, "%Y-%m-%dT%H:%M:%S%.f%:z")
                    .ok()
                    .map(|dt| dt.date_naive())
            }
            Layout::DateTime(fmt) => NaiveDateTime::parse_from_str(token, fmt)
                .ok()
                .map(|dt| dt.date()),
        }
    }
}

/// Extract the expiry date from raw registry text as `YYYY-MM-DD`.
///
/// Returns `None` when no expiry label is followed by a parsable date.
///
/// ```
/// use expiry_check_lib::extract_expiry;
///
/// let raw = "Domain Name: EXAMPLE.COM\nRegistry Expiry Date: 2026-01-03T05:00:00Z\n";
/// assert_eq!(extract_expiry(raw).as_deref(), Some("2026-01-03"));
/// assert_eq!(extract_expiry("no dates here"), None);
/// ```
pub fn extract_expiry(raw: &str) -> Option<String> {
    resolve_expiry_date(raw).map(format_date)
}

/// Same as [`extract_expiry`] but returns the parsed date.
///
/// Only the first expiry label in the text is considered. If its value does
/// not parse, there is no answer; later labels are not tried.
pub fn resolve_expiry_date(raw: &str) -> Option<NaiveDate> {
    let text = normalize_line_breaks(raw);

    let token = EXPIRY_PATTERN.captures(&text)?.get(2)?;
    parse_with_layouts(token.as_str())
}

/// Parse a captured token against the ordered layout list.
///
/// The token is cleaned first: surrounding whitespace and `:` are stripped and
/// runs of internal whitespace collapse to one space.
pub fn parse_with_layouts(token: &str) -> Option<NaiveDate> {
    let cleaned = clean_token(token);
    if cleaned.is_empty() {
        return None;
    }

    LAYOUTS.iter().find_map(|layout| layout.parse(&cleaned))
}

/// Strict `YYYY-MM-DD` parse used for explicit, cached and gateway dates.
pub fn parse_expiry_date(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), DATE_FORMAT).ok()
}

/// Render a date in the canonical format.
pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

/// Shorten a raw response for log output.
pub(crate) fn snippet(raw: &str, max_chars: usize) -> String {
    let text = normalize_line_breaks(raw);
    let mut out: String = text.chars().take(max_chars).collect();
    if text.chars().count() > max_chars {
        out.push_str(" ... (truncated)");
    }
    out
}

fn normalize_line_breaks(raw: &str) -> String {
    raw.replace("\r\n", "\n").replace('\r', "\n")
}

fn clean_token(token: &str) -> String {
    let trimmed = token.trim().trim_matches(':').trim();
    trimmed.split_whitespace().collect::<Vec<_>>().join(" ")
}
