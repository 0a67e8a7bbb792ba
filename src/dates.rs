use chrono::{Local, NaiveDate};

pub const DAY_FORMAT: &str = "%Y-%m-%d";

/// Date part of a stored date or datetime (`2025-03-01T10:00:00Z` -> `2025-03-01`).
pub fn date_portion(value: &str) -> &str {
    let value = value.trim();
    match value.find(['T', ' ']) {
        Some(idx) => &value[..idx],
        None => value,
    }
}

pub fn parse_day(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(date_portion(value), DAY_FORMAT).ok()
}

/// Today's calendar date in the local timezone. Never derived from UTC:
/// date-only backend fields would be off by one near midnight.
pub fn local_today() -> NaiveDate {
    Local::now().date_naive()
}

pub fn local_today_string() -> String {
    local_today().format(DAY_FORMAT).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_time_and_timezone_suffixes() {
        assert_eq!(date_portion("2025-03-01"), "2025-03-01");
        assert_eq!(date_portion("2025-03-01T23:30:00-05:00"), "2025-03-01");
        assert_eq!(date_portion("2025-03-01 08:00"), "2025-03-01");
    }

    #[test]
    fn parses_only_valid_days() {
        assert_eq!(parse_day("2025-02-28T00:00:00Z"), NaiveDate::from_ymd_opt(2025, 2, 28));
        assert_eq!(parse_day("2025-02-30"), None);
        assert_eq!(parse_day(""), None);
    }
}
