//! Date normalization for Mexican tickets.

use chrono::{Datelike, Local, NaiveDate};

use super::patterns::{DATE_ISO, DATE_MONTH_NAME, DATE_NUMERIC};

/// Normalize a raw date to a calendar date, using the current year when missing.
pub fn normalize_date(raw: &str) -> Option<NaiveDate> {
    normalize_date_with_year(raw, Local::now().year())
}

/// Normalize a raw date with an explicit current year.
///
/// Accepts `D/M/Y`, `D-M-Y`, `Y-M-D` and `D-MON[-Y]` with Spanish or English
/// three-letter month abbreviations. Two-digit years fall in the current century.
pub fn normalize_date_with_year(raw: &str, current_year: i32) -> Option<NaiveDate> {
    let raw = raw.trim();

    if let Some(caps) = DATE_ISO.captures(raw) {
        return NaiveDate::from_ymd_opt(
            caps[1].parse().ok()?,
            caps[2].parse().ok()?,
            caps[3].parse().ok()?,
        );
    }

    if let Some(caps) = DATE_NUMERIC.captures(raw) {
        let day: u32 = caps[1].parse().ok()?;
        let month: u32 = caps[2].parse().ok()?;
        let year = expand_year(&caps[3], current_year)?;
        return NaiveDate::from_ymd_opt(year, month, day);
    }

    if let Some(caps) = DATE_MONTH_NAME.captures(raw) {
        let day: u32 = caps[1].parse().ok()?;
        let month = month_from_abbreviation(&caps[2])?;
        let year = match caps.get(3) {
            Some(y) => expand_year(y.as_str(), current_year)?,
            None => current_year,
        };
        return NaiveDate::from_ymd_opt(year, month, day);
    }

    None
}

/// Format a raw date as `YYYY-MM-DD`, if it can be normalized.
pub fn format_date(raw: &str) -> Option<String> {
    normalize_date(raw).map(|d| d.format("%Y-%m-%d").to_string())
}

fn expand_year(year: &str, current_year: i32) -> Option<i32> {
    let value: i32 = year.parse().ok()?;
    if year.len() == 2 {
        Some(current_year - current_year.rem_euclid(100) + value)
    } else {
        Some(value)
    }
}

fn month_from_abbreviation(month: &str) -> Option<u32> {
    let month = match month.to_uppercase().as_str() {
        "ENE" | "JAN" => 1,
        "FEB" => 2,
        "MAR" => 3,
        "ABR" | "APR" => 4,
        "MAY" => 5,
        "JUN" => 6,
        "JUL" => 7,
        "AGO" | "AUG" => 8,
        "SEP" | "SET" => 9,
        "OCT" => 10,
        "NOV" => 11,
        "DIC" | "DEC" => 12,
        _ => return None,
    };
    Some(month)
}
