//! Date parsing for info dictionaries and XMP packets

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveDateTime, TimeZone};
use regex::Regex;
use std::sync::LazyLock;

static PDF_DATE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:D:)?(\d{4})(\d{2})?(\d{2})?(\d{2})?(\d{2})?(\d{2})?([Z+\-])?(\d{2})?'?(\d{2})?'?")
        .unwrap()
});

fn field(captures: &regex::Captures<'_>, index: usize) -> Option<i64> {
    captures.get(index).and_then(|m| m.as_str().parse().ok())
}

/// Parses a PDF date string such as `D:20070223175637+02'00'`
///
/// Only the year is mandatory. Out-of-range fields fall back to their
/// lowest value, a day past the end of the month rolls into the next one,
/// and a missing zone means UTC. The returned value keeps the stated offset.
pub fn parse_pdf_date(input: &str) -> Option<DateTime<FixedOffset>> {
    let captures = PDF_DATE_REGEX.captures(input.trim())?;

    let year = field(&captures, 1)? as i32;
    let month = field(&captures, 2).filter(|m| (1..=12).contains(m)).unwrap_or(1);
    let day = field(&captures, 3).filter(|d| (1..=31).contains(d)).unwrap_or(1);
    let hour = field(&captures, 4).filter(|h| (0..=23).contains(h)).unwrap_or(0);
    let minute = field(&captures, 5).filter(|m| (0..=59).contains(m)).unwrap_or(0);
    let second = field(&captures, 6).filter(|s| (0..=59).contains(s)).unwrap_or(0);

    let relation = captures.get(7).map_or("Z", |m| m.as_str());
    let offset_hour = field(&captures, 8).filter(|h| (0..=23).contains(h)).unwrap_or(0);
    let offset_minute = field(&captures, 9).filter(|m| (0..=59).contains(m)).unwrap_or(0);
    let offset_seconds = match relation {
        "+" => (offset_hour * 3600 + offset_minute * 60) as i32,
        "-" => -((offset_hour * 3600 + offset_minute * 60) as i32),
        _ => 0,
    };

    let local = NaiveDate::from_ymd_opt(year, month as u32, 1)?.and_hms_opt(0, 0, 0)?
        + Duration::days(day - 1)
        + Duration::hours(hour)
        + Duration::minutes(minute)
        + Duration::seconds(second);
    let offset = FixedOffset::east_opt(offset_seconds)?;
    offset.from_local_datetime(&local).single()
}

/// Parses an XMP (ISO 8601) date; a value without a zone is taken as UTC
pub fn parse_xmp_date(input: &str) -> Option<DateTime<FixedOffset>> {
    let input = input.trim();
    if let Ok(date) = DateTime::parse_from_rfc3339(input) {
        return Some(date);
    }

    let zoned = match input.strip_suffix('Z') {
        Some(rest) => format!("{}+00:00", rest),
        None => input.to_string(),
    };
    for format in ["%Y-%m-%dT%H:%M:%S%.f%:z", "%Y-%m-%dT%H:%M%:z"] {
        if let Ok(date) = DateTime::parse_from_str(&zoned, format) {
            return Some(date);
        }
    }

    let utc = FixedOffset::east_opt(0)?;
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(input, format) {
            return Some(utc.from_utc_datetime(&naive));
        }
    }

    let date = match input.len() {
        10 => NaiveDate::parse_from_str(input, "%Y-%m-%d").ok()?,
        7 => NaiveDate::parse_from_str(&format!("{}-01", input), "%Y-%m-%d").ok()?,
        4 => NaiveDate::from_ymd_opt(input.parse().ok()?, 1, 1)?,
        _ => return None,
    };
    Some(utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pdf(input: &str) -> String {
        parse_pdf_date(input).map(|d| d.to_rfc3339()).unwrap_or_default()
    }

    fn xmp(input: &str) -> String {
        parse_xmp_date(input).map(|d| d.to_rfc3339()).unwrap_or_default()
    }

    #[test]
    fn test_full_pdf_date_keeps_offset() {
        assert_eq!(pdf("D:20070223175637+02'00'"), "2007-02-23T17:56:37+02:00");
        assert_eq!(
            parse_pdf_date("D:20070223175637+02'00'").unwrap().timestamp(),
            parse_pdf_date("D:20070223155637Z").unwrap().timestamp()
        );
    }

    #[test]
    fn test_negative_offset_without_apostrophes() {
        assert_eq!(pdf("D:199812231952-0800"), "1998-12-23T19:52:00-08:00");
    }

    #[test]
    fn test_year_only() {
        assert_eq!(pdf("D:2020"), "2020-01-01T00:00:00+00:00");
    }

    #[test]
    fn test_prefix_is_optional() {
        assert_eq!(pdf("20200102"), "2020-01-02T00:00:00+00:00");
    }

    #[test]
    fn test_out_of_range_fields_fall_back() {
        assert_eq!(pdf("D:20201399256161"), "2020-01-01T00:00:00+00:00");
    }

    #[test]
    fn test_day_past_month_end_rolls_over() {
        assert_eq!(pdf("D:20230231"), "2023-03-03T00:00:00+00:00");
    }

    #[test]
    fn test_garbage_is_none() {
        assert!(parse_pdf_date("yesterday").is_none());
        assert!(parse_pdf_date("").is_none());
        assert!(parse_pdf_date("D:20").is_none());
    }

    #[test]
    fn test_xmp_variants() {
        assert_eq!(xmp("2007-02-23T17:56:37+02:00"), "2007-02-23T17:56:37+02:00");
        assert_eq!(xmp("2007-02-23T17:56+02:00"), "2007-02-23T17:56:00+02:00");
        assert_eq!(xmp("2007-02-23T17:56Z"), "2007-02-23T17:56:00+00:00");
        assert_eq!(xmp("2007-02-23T17:56:37"), "2007-02-23T17:56:37+00:00");
        assert_eq!(xmp("2007-02-23"), "2007-02-23T00:00:00+00:00");
        assert_eq!(xmp("2007-02"), "2007-02-01T00:00:00+00:00");
        assert_eq!(xmp("2007"), "2007-01-01T00:00:00+00:00");
        assert_eq!(xmp("not a date"), "");
    }
}
