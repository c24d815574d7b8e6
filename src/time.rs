//! `START_TIME` pattern formatting and the default time format.
//!
//! The pattern language is strftime, extended with Envoy's `%N…` subsecond
//! specifier. `chrono`'s `DateTime::format` already implements strftime
//! faithfully, including the `%f`-family specifiers, so the only extra
//! work here is expanding `%N` (milliseconds, zero-padded to 3 digits)
//! before handing the rest to `chrono`.

use chrono::{DateTime, Utc};
use regex::Regex;
use std::sync::OnceLock;

/// ISO-8601 UTC with millisecond precision: `2006-01-02T15:04:05.000Z`.
pub const DEFAULT_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";

fn newline_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"%[-_0^#]*[1-9]*n").expect("static pattern"))
}

/// Reject a `START_TIME` pattern that contains a strftime subpattern which
/// would introduce a literal newline into the log line (e.g. bare `%n`).
pub fn contains_illegal_newline(pattern: &str) -> bool {
    newline_pattern().is_match(pattern)
}

/// Format `when` using `pattern`, or [`DEFAULT_TIME_FORMAT`] if `pattern`
/// is empty. `%N` expands to milliseconds, zero-padded to 3 digits.
pub fn format_start_time(pattern: &str, when: DateTime<Utc>) -> String {
    if pattern.is_empty() {
        return when.format(DEFAULT_TIME_FORMAT).to_string();
    }
    let expanded = expand_millis_specifier(pattern, when);
    when.format(&expanded).to_string()
}

fn expand_millis_specifier(pattern: &str, when: DateTime<Utc>) -> String {
    if !pattern.contains("%N") {
        return pattern.to_string();
    }
    let millis = format!("{:03}", when.timestamp_subsec_millis());
    pattern.replace("%N", &millis)
}
