//! Header block parsing: unfolding, key/value splitting, and `Date`
//! canonicalization.

use chrono::{DateTime, Local, NaiveDateTime};
use tracing::debug;

use crate::mail::ParseError;

/// A single parsed header entry. Key casing is preserved as written by the
/// client; lookups compare case-insensitively.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderItem {
    key: String,
    values: Vec<String>,
}

impl HeaderItem {
    /// The header key with its original casing.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// All values recorded for this key, in the order received.
    pub fn values(&self) -> &[String] {
        &self.values
    }
}

/// An ordered set of header items parsed from one header block.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderSet {
    items: Vec<HeaderItem>,
}

impl HeaderSet {
    /// Parse a raw header block. The block is unfolded first, then each
    /// line is split on the first `:` with key and value trimmed. A line
    /// without a `:` is an invalid header.
    pub fn parse(block: &str) -> Result<HeaderSet, ParseError> {
        let unfolded = Self::unfold(block);
        let mut set = HeaderSet::default();

        for line in unfolded.split("\r\n") {
            if line.trim().is_empty() {
                continue;
            }

            let (key, value) = line
                .split_once(':')
                .ok_or_else(|| ParseError::InvalidHeader(line.to_string()))?;

            set.append(key.trim(), value.trim());
        }

        Ok(set)
    }

    /// Join continuation lines (lines starting with whitespace) onto the
    /// preceding line, collapsing the continuation's leading whitespace to
    /// a single space. Unfolding an already-unfolded block is a no-op.
    pub fn unfold(headers: &str) -> String {
        let mut lines: Vec<String> = Vec::new();

        for line in headers.split("\r\n") {
            if line.starts_with(' ') || line.starts_with('\t') {
                if let Some(previous) = lines.last_mut() {
                    previous.push(' ');
                    previous.push_str(line.trim_start());
                    continue;
                }
            }

            lines.push(line.to_string());
        }

        lines.join("\r\n")
    }

    fn append(&mut self, key: &str, value: &str) {
        for item in &mut self.items {
            if item.key.eq_ignore_ascii_case(key) {
                item.values.push(value.to_string());
                return;
            }
        }

        self.items.push(HeaderItem {
            key: key.to_string(),
            values: vec![value.to_string()],
        });
    }

    /// Look up a header by name, case-insensitively.
    pub fn get(&self, name: &str) -> Option<&HeaderItem> {
        self.items
            .iter()
            .find(|item| item.key.eq_ignore_ascii_case(name))
    }

    /// The first value recorded for a header, or an empty string.
    pub fn value(&self, name: &str) -> &str {
        self.get(name)
            .and_then(|item| item.values.first())
            .map_or("", String::as_str)
    }

    /// All items in the order their keys first appeared.
    pub fn items(&self) -> &[HeaderItem] {
        &self.items
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Date header formats clients actually send, tried in order.
const DATE_FORMATS: &[&str] = &[
    "%a, %d %b %Y %H:%M:%S %z",
    "%d %b %Y %H:%M:%S %z",
    "%a, %d %b %Y %H:%M:%S",
    "%d %b %Y %H:%M:%S",
];

/// Canonical timestamp layout used everywhere a date is stored or compared.
pub const DATE_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Canonicalize a `Date` header value to `YYYY-MM-DD HH:MM:SS`, keeping the
/// sender's wall-clock time. Returns `None` when no format matches.
pub fn parse_date_time(value: &str) -> Option<String> {
    let cleaned = strip_zone_name(value.trim());
    if cleaned.is_empty() {
        return None;
    }

    for format in DATE_FORMATS {
        if format.contains("%z") {
            if let Ok(parsed) = DateTime::parse_from_str(cleaned, format) {
                return Some(parsed.naive_local().format(DATE_TIME_FORMAT).to_string());
            }
        } else if let Ok(parsed) = NaiveDateTime::parse_from_str(cleaned, format) {
            return Some(parsed.format(DATE_TIME_FORMAT).to_string());
        }
    }

    debug!("unrecognized date header: {value}");
    None
}

/// The current wall-clock time in the canonical layout, used when a mail
/// carries no parseable `Date` header.
pub fn current_date_time() -> String {
    Local::now().format(DATE_TIME_FORMAT).to_string()
}

/// Drop a trailing zone name like `CST` or `(MST)` that follows the numeric
/// offset in some clients' Date headers.
fn strip_zone_name(value: &str) -> &str {
    let value = value.trim_end();

    if value.ends_with(')') {
        if let Some(open) = value.rfind('(') {
            return value[..open].trim_end();
        }
    }

    if let Some((rest, last)) = value.rsplit_once(' ') {
        if !last.is_empty() && last.chars().all(|c| c.is_ascii_alphabetic()) {
            return rest.trim_end();
        }
    }

    value
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unfold_joins_continuation_lines() {
        let headers = "Content-Type: text/html\r\n boundary=\"abcd\"\r\nSubject: Test\r\nX-Mailer: This is\r\n a test\r\n";
        let expected = "Content-Type: text/html boundary=\"abcd\"\r\nSubject: Test\r\nX-Mailer: This is a test\r\n";

        assert_eq!(HeaderSet::unfold(headers), expected);
    }

    #[test]
    fn test_unfold_is_idempotent() {
        let headers = "Content-Type: text/html\r\n boundary=\"abcd\"\r\nSubject: Test\r\n";
        let once = HeaderSet::unfold(headers);
        let twice = HeaderSet::unfold(&once);

        assert_eq!(once, twice);
    }

    #[test]
    fn test_parse_builds_ordered_items() {
        let set = HeaderSet::parse(
            "Content-Type: text/html;\r\n boundary=\"abcd\"\r\nSubject: Test\r\nX-Mailer: This is\r\n a test\r\n",
        )
        .unwrap();

        let keys: Vec<&str> = set.items().iter().map(HeaderItem::key).collect();
        assert_eq!(keys, vec!["Content-Type", "Subject", "X-Mailer"]);
        assert_eq!(set.value("Content-Type"), "text/html; boundary=\"abcd\"");
        assert_eq!(set.value("X-Mailer"), "This is a test");
    }

    #[test]
    fn test_parse_rejects_line_without_colon() {
        let result = HeaderSet::parse("Subject test\r\n");
        assert!(matches!(result, Err(ParseError::InvalidHeader(_))));
    }

    #[test]
    fn test_lookup_is_case_insensitive() {
        let set = HeaderSet::parse("Subject: Test\r\n").unwrap();

        assert_eq!(set.value("subject"), "Test");
        assert_eq!(set.value("SUBJECT"), "Test");
        assert_eq!(set.get("subject").unwrap().key(), "Subject");
    }

    #[test]
    fn test_duplicate_keys_collect_values_in_order() {
        let set = HeaderSet::parse("Received: one\r\nReceived: two\r\n").unwrap();

        assert_eq!(set.get("received").unwrap().values(), ["one", "two"]);
    }

    #[test]
    fn test_missing_header_returns_empty_value() {
        let set = HeaderSet::parse("Subject: Test\r\n").unwrap();

        assert!(set.get("bob").is_none());
        assert_eq!(set.value("bob"), "");
    }

    #[test]
    fn test_parse_date_with_offset_and_zone_name() {
        let result = parse_date_time("Thu, 08 Dec 2016 23:46:05 -0600 CST");
        assert_eq!(result.as_deref(), Some("2016-12-08 23:46:05"));
    }

    #[test]
    fn test_parse_date_with_parenthesized_zone() {
        let result = parse_date_time("Tue, 19 Apr 2016 23:32:02 -0500 (CDT)");
        assert_eq!(result.as_deref(), Some("2016-04-19 23:32:02"));
    }

    #[test]
    fn test_parse_date_without_weekday() {
        let result = parse_date_time("08 Dec 2016 23:46:05 -0600");
        assert_eq!(result.as_deref(), Some("2016-12-08 23:46:05"));
    }

    #[test]
    fn test_parse_date_single_digit_day() {
        let result = parse_date_time("Tue, 9 Apr 2016 03:02:01 -0500");
        assert_eq!(result.as_deref(), Some("2016-04-09 03:02:01"));
    }

    #[test]
    fn test_parse_date_garbage_returns_none() {
        assert!(parse_date_time("not a date").is_none());
        assert!(parse_date_time("").is_none());
    }
}
