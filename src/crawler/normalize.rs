//! Raw-text to typed-value conversion for ad fields.
//!
//! Everything here is best-effort: unparseable text yields a default or
//! `None`, never an error. All functions that depend on the clock take an
//! explicit `now`.

use chrono::{DateTime, Datelike, Duration, TimeZone, Utc};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::models::Location;

static DAY_MONTH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d{1,2})\.\s*(\d{1,2})\.").expect("valid regex"));
static DIGIT_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+").expect("valid regex"));
// Slovak postal format: three digits, optional space, two digits
static POSTAL_SPACED: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d{3}\s*\d{2}").expect("valid regex"));
static CITY_THEN_DIGITS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\p{L}[\p{L}\s]*?)(\d{5,6})").expect("valid regex"));
static FIVE_DIGITS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d{5}").expect("valid regex"));
static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid regex"));

/// Strip everything but digits; an ad with no numeric price is 0
/// ("Dohodou", "Zadarmo" and friends).
pub fn parse_price(text: &str) -> i64 {
    let digits: String = text.chars().filter(|c| c.is_ascii_digit()).collect();
    digits.parse().unwrap_or(0)
}

/// Parse the date column of a search-results row.
///
/// The site prints "Dnes", "Včera" or a year-less `D.M.` date. A `D.M.` date
/// that lands in the future belongs to last year (ads published before the
/// year boundary).
pub fn parse_relative_date(text: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let lower = text.trim().to_lowercase();
    if lower.contains("dnes") {
        return Some(now);
    }
    if lower.contains("včera") {
        return Some(now - Duration::days(1));
    }

    let caps = DAY_MONTH.captures(&lower)?;
    let day: u32 = caps[1].parse().ok()?;
    let month: u32 = caps[2].parse().ok()?;

    let date = Utc
        .with_ymd_and_hms(now.year(), month, day, 0, 0, 0)
        .single()?;
    if date > now {
        return Utc
            .with_ymd_and_hms(now.year() - 1, month, day, 0, 0, 0)
            .single();
    }
    Some(date)
}

/// Split the raw location string into city and postal code.
///
/// The site renders these concatenated without a separator, so three patterns
/// are tried in order, first match wins.
pub fn parse_location(raw: &str) -> Location {
    let raw = raw.trim();
    if raw.is_empty() {
        return Location::default();
    }

    // "Bratislava851 06" - embedded 3+2-digit Slovak postal code
    if let Some(m) = POSTAL_SPACED.find(raw) {
        let city = POSTAL_SPACED.replace_all(raw, "").trim().to_string();
        return Location {
            city,
            postal_code: m.as_str().to_string(),
        };
    }

    // "Nitra95001" - letters immediately followed by 5-6 digits
    if let Some(caps) = CITY_THEN_DIGITS.captures(raw) {
        return Location {
            city: caps[1].trim().to_string(),
            postal_code: caps[2].to_string(),
        };
    }

    // any standalone run of exactly five digits
    if let Some(m) = FIVE_DIGITS.find(raw) {
        let stripped = FIVE_DIGITS.replace_all(raw, "");
        let city = WHITESPACE.replace_all(stripped.trim(), " ").to_string();
        return Location {
            city,
            postal_code: m.as_str().to_string(),
        };
    }

    Location {
        city: raw.to_string(),
        postal_code: String::new(),
    }
}

/// First run of digits in the view counter, else 0.
pub fn parse_view_count(text: &str) -> u32 {
    DIGIT_RUN
        .find(text)
        .and_then(|m| m.as_str().parse().ok())
        .unwrap_or(0)
}
