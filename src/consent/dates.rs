//! Signing date recognition.
//!
//! Dates are typed or stamped in whatever form the upload partner used:
//! ISO, US numeric, English month names or Spanish month names.

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;

static ISO_DATE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(\d{4})-(\d{1,2})-(\d{1,2})\b").expect("ISO date regex should compile")
});

static US_NUMERIC_DATE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(\d{1,2})/(\d{1,2})/(\d{4})\b").expect("US date regex should compile")
});

// "March 1, 2022", "Mar. 1 2022"
static MONTH_DAY_YEAR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b([a-z]{3,9})\.?\s+(\d{1,2}),?\s+(\d{4})\b")
        .expect("month-day-year regex should compile")
});

// "1 March 2022", "1 de marzo de 2022", "1 de marzo del 2022"
static DAY_MONTH_YEAR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(\d{1,2})\s+(?:de\s+)?(\p{L}{3,10})\.?,?\s+(?:del?\s+)?(\d{4})\b")
        .expect("day-month-year regex should compile")
});

const MONTHS: [(&str, u32); 24] = [
    ("january", 1),
    ("february", 2),
    ("march", 3),
    ("april", 4),
    ("may", 5),
    ("june", 6),
    ("july", 7),
    ("august", 8),
    ("september", 9),
    ("october", 10),
    ("november", 11),
    ("december", 12),
    ("enero", 1),
    ("febrero", 2),
    ("marzo", 3),
    ("abril", 4),
    ("mayo", 5),
    ("junio", 6),
    ("julio", 7),
    ("agosto", 8),
    ("septiembre", 9),
    ("octubre", 10),
    ("noviembre", 11),
    ("diciembre", 12),
];

/// Month number for a full or three-letter (English or Spanish) name.
fn month_number(name: &str) -> Option<u32> {
    let name = name.to_lowercase();
    if name.chars().count() < 3 {
        return None;
    }
    MONTHS
        .iter()
        .find(|(full, _)| {
            *full == name || (name.chars().count() <= 4 && full.starts_with(name.as_str()))
        })
        .map(|(_, number)| *number)
        .or(match name.as_str() {
            "sept" | "setiembre" => Some(9),
            _ => None,
        })
}

fn number<T: std::str::FromStr>(text: &str) -> Option<T> {
    text.parse().ok()
}

/// Finds the first calendar date in `text`.
pub fn parse_signing_date(text: &str) -> Option<NaiveDate> {
    if let Some(caps) = ISO_DATE.captures(text) {
        if let Some(date) = NaiveDate::from_ymd_opt(
            number(&caps[1])?,
            number(&caps[2])?,
            number(&caps[3])?,
        ) {
            return Some(date);
        }
    }

    if let Some(caps) = US_NUMERIC_DATE.captures(text) {
        if let Some(date) = NaiveDate::from_ymd_opt(
            number(&caps[3])?,
            number(&caps[1])?,
            number(&caps[2])?,
        ) {
            return Some(date);
        }
    }

    for caps in MONTH_DAY_YEAR.captures_iter(text) {
        let Some(month) = month_number(&caps[1]) else {
            continue;
        };
        if let Some(date) =
            NaiveDate::from_ymd_opt(number(&caps[3])?, month, number(&caps[2])?)
        {
            return Some(date);
        }
    }

    for caps in DAY_MONTH_YEAR.captures_iter(text) {
        let Some(month) = month_number(&caps[2]) else {
            continue;
        };
        if let Some(date) =
            NaiveDate::from_ymd_opt(number(&caps[3])?, month, number(&caps[1])?)
        {
            return Some(date);
        }
    }

    None
}
