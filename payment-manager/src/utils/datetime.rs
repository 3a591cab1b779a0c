use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
];

const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%m/%d/%Y",
    "%d %B %Y",
    "%d %b %Y",
    "%B %d, %Y",
    "%b %d, %Y",
];

/// Parse a date or date-time written in any of the common layouts.
///
/// Values with an explicit offset are converted to UTC; values without one are
/// taken to already be UTC. A bare date means midnight UTC.
pub fn parse_flexible_datetime(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(value) {
        return Some(dt.with_timezone(&Utc));
    }

    for format in DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, format) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }

    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(value, format) {
            return date
                .and_hms_opt(0, 0, 0)
                .map(|naive| Utc.from_utc_datetime(&naive));
        }
    }

    None
}

/// Parse a Unix timestamp in seconds; fractional seconds are kept.
pub fn parse_epoch_seconds(value: &str) -> Option<DateTime<Utc>> {
    let seconds: f64 = value.trim().parse().ok()?;
    if !seconds.is_finite() {
        return None;
    }

    let whole = seconds.floor();
    let nanos = ((seconds - whole) * 1_000_000_000.0).round() as u32;
    DateTime::from_timestamp(whole as i64, nanos.min(999_999_999))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn parses_rfc3339_with_offset_into_utc() {
        let dt = parse_flexible_datetime("2024-03-01T23:30:00-02:00").unwrap();
        assert_eq!(dt.day(), 2);
        assert_eq!(dt.hour(), 1);
    }

    #[test]
    fn parses_bare_date_as_midnight() {
        let dt = parse_flexible_datetime("2024-03-01").unwrap();
        assert_eq!((dt.year(), dt.month(), dt.day()), (2024, 3, 1));
        assert_eq!(dt.hour(), 0);
    }

    #[test]
    fn parses_space_separated_datetime() {
        let dt = parse_flexible_datetime("2024-03-01 10:15:00").unwrap();
        assert_eq!(dt.hour(), 10);
        assert_eq!(dt.minute(), 15);
    }

    #[test]
    fn parses_us_style_date() {
        let dt = parse_flexible_datetime("12/31/2024").unwrap();
        assert_eq!((dt.month(), dt.day()), (12, 31));
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse_flexible_datetime("not a date").is_none());
        assert!(parse_flexible_datetime("").is_none());
    }

    #[test]
    fn epoch_seconds() {
        let dt = parse_epoch_seconds("1700000000").unwrap();
        assert_eq!(dt.timestamp(), 1_700_000_000);

        let dt = parse_epoch_seconds("1700000000.5").unwrap();
        assert_eq!(dt.timestamp_subsec_millis(), 500);

        assert!(parse_epoch_seconds("2024-01-01").is_none());
    }
}
