//! Helpers for dates and free text shared by the engine operations.
//!
//! Value dates travel as `DD-MM-YYYY` strings at the edges (statements, API)
//! and as [`NaiveDate`] inside the engine and the store.

use chrono::{DateTime, Days, NaiveDate, Utc};
use unicode_normalization::UnicodeNormalization;

use crate::{EngineError, ResultEngine};

/// Display format for value dates.
pub const DISPLAY_DATE_FORMAT: &str = "%d-%m-%Y";

/// Remarks stored when the statement row leaves the column blank.
pub const MISSING_REMARKS: &str = "N/A";

const ACCEPTED_DATE_FORMATS: [&str; 3] = [DISPLAY_DATE_FORMAT, "%d/%m/%Y", "%Y-%m-%d"];

/// Formats a date as `DD-MM-YYYY`.
pub fn format_display_date(date: NaiveDate) -> String {
    date.format(DISPLAY_DATE_FORMAT).to_string()
}

/// Parses `DD-MM-YYYY`, `DD/MM/YYYY` or `YYYY-MM-DD`.
pub fn parse_display_date(value: &str) -> ResultEngine<NaiveDate> {
    let trimmed = value.trim();
    ACCEPTED_DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(trimmed, format).ok())
        .ok_or_else(|| EngineError::InvalidDate(format!("unrecognized date: {trimmed}")))
}

/// Midnight UTC at the start of `date`.
pub(crate) fn day_start(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(chrono::NaiveTime::MIN).and_utc()
}

/// Midnight UTC at the start of the day after `date`.
pub(crate) fn next_day_start(date: NaiveDate) -> ResultEngine<DateTime<Utc>> {
    date.checked_add_days(Days::new(1))
        .map(day_start)
        .ok_or_else(|| EngineError::InvalidDate(format!("date out of range: {date}")))
}

pub(crate) fn normalize_optional_text(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.nfc().collect::<String>())
}

/// Remarks are NFC-normalized and trimmed so duplicate detection compares the
/// same bytes the store holds.
pub(crate) fn normalize_remarks(value: Option<&str>) -> String {
    normalize_optional_text(value).unwrap_or_else(|| MISSING_REMARKS.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_all_accepted_formats() {
        let expected = NaiveDate::from_ymd_opt(2024, 3, 7).unwrap();
        assert_eq!(parse_display_date("07-03-2024").unwrap(), expected);
        assert_eq!(parse_display_date("07/03/2024").unwrap(), expected);
        assert_eq!(parse_display_date(" 2024-03-07 ").unwrap(), expected);
        assert!(parse_display_date("March 7").is_err());
    }

    #[test]
    fn display_round_trips() {
        let date = NaiveDate::from_ymd_opt(2023, 12, 31).unwrap();
        assert_eq!(format_display_date(date), "31-12-2023");
    }

    #[test]
    fn blank_remarks_become_placeholder() {
        assert_eq!(normalize_remarks(None), MISSING_REMARKS);
        assert_eq!(normalize_remarks(Some("   ")), MISSING_REMARKS);
        assert_eq!(normalize_remarks(Some(" TRF FROM ACME ")), "TRF FROM ACME");
    }

    #[test]
    fn next_day_start_is_exclusive_bound() {
        let date = NaiveDate::from_ymd_opt(2024, 2, 29).unwrap();
        let bound = next_day_start(date).unwrap();
        assert_eq!(bound.date_naive(), NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
    }
}
