//! Human-readable report identifiers of the form `RPT-YYYYMMDD-NNNN`.

use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;

pub const PREFIX: &str = "RPT";
pub const MAX_DAILY_SEQUENCE: u32 = 9999;

static TRACKING_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^RPT-(\d{8})-(\d{4})$").expect("valid tracking id regex"));

pub fn format(date: NaiveDate, sequence: u32) -> String {
    format!("{PREFIX}-{}-{:04}", date.format("%Y%m%d"), sequence)
}

/// `LIKE` pattern matching every tracking id issued on `date`.
pub fn day_pattern(date: NaiveDate) -> String {
    format!("{PREFIX}-{}-%", date.format("%Y%m%d"))
}

pub fn is_valid(value: &str) -> bool {
    parse(value).is_some()
}

pub fn parse(value: &str) -> Option<(NaiveDate, u32)> {
    let caps = TRACKING_ID_RE.captures(value)?;
    let date = NaiveDate::parse_from_str(&caps[1], "%Y%m%d").ok()?;
    let sequence = caps[2].parse().ok()?;
    Some((date, sequence))
}
