//! Local-time helpers: ISO-8601 formatting and calendar-day bounds

use chrono::{DateTime, Datelike, Duration, FixedOffset, Local, LocalResult, NaiveDate, NaiveTime, TimeZone};

/// `YYYY-MM-DDTHH:MM:SS±HH:MM`, seconds precision
pub fn format_iso8601<Tz>(ts: &DateTime<Tz>) -> String
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    ts.format("%Y-%m-%dT%H:%M:%S%:z").to_string()
}

/// Parse an RFC 3339 timestamp token (`Z` or `±HH:MM` offset)
pub fn parse_iso8601(token: &str) -> Option<DateTime<FixedOffset>> {
    DateTime::parse_from_rfc3339(token).ok()
}

/// First instant of `date` in local time.
///
/// Where local midnight does not exist (DST gap), the first valid instant
/// after it is used.
pub fn local_midnight(date: NaiveDate) -> DateTime<Local> {
    let naive = date.and_time(NaiveTime::MIN);
    match Local.from_local_datetime(&naive) {
        LocalResult::Single(ts) => ts,
        LocalResult::Ambiguous(earliest, _) => earliest,
        LocalResult::None => {
            // Gaps are at most a few hours; walk forward until time exists
            let mut candidate = naive;
            loop {
                candidate += Duration::minutes(15);
                if let Some(ts) = Local.from_local_datetime(&candidate).earliest() {
                    return ts;
                }
            }
        }
    }
}

/// `[start, end)` of the local calendar day containing `ts`
pub fn day_bounds(ts: &DateTime<Local>) -> (DateTime<Local>, DateTime<Local>) {
    let date = ts.date_naive();
    let next = date.succ_opt().unwrap_or(date);
    (local_midnight(date), local_midnight(next))
}

/// Zero-padded `(yyyy, mm, dd)` of the local calendar day
pub fn day_parts(ts: &DateTime<Local>) -> (String, String, String) {
    (
        format!("{:04}", ts.year()),
        format!("{:02}", ts.month()),
        format!("{:02}", ts.day()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    #[test]
    fn test_format_fixed_offset() {
        let tz = FixedOffset::west_opt(5 * 3600).unwrap();
        let ts = tz.with_ymd_and_hms(2017, 3, 9, 7, 5, 2).unwrap();
        assert_eq!(format_iso8601(&ts), "2017-03-09T07:05:02-05:00");

        let tz = FixedOffset::east_opt(5 * 3600 + 30 * 60).unwrap();
        let ts = tz.with_ymd_and_hms(2017, 3, 9, 7, 5, 2).unwrap();
        assert_eq!(format_iso8601(&ts), "2017-03-09T07:05:02+05:30");
    }

    #[test]
    fn test_parse_round_trips_offset() {
        let parsed = parse_iso8601("2017-03-09T07:05:02-05:00").unwrap();
        assert_eq!(format_iso8601(&parsed), "2017-03-09T07:05:02-05:00");
        assert!(parse_iso8601("2017-03-09T07:05:02Z").is_some());
        assert!(parse_iso8601("temperature:20").is_none());
    }

    #[test]
    fn test_day_bounds_contain_timestamp() {
        let ts = Local.with_ymd_and_hms(2020, 6, 15, 13, 45, 0).unwrap();
        let (start, end) = day_bounds(&ts);

        assert!(start <= ts && ts < end);
        assert_eq!(start.date_naive(), ts.date_naive());
        assert_eq!(start.hour(), 0);
        assert_eq!(end.date_naive(), ts.date_naive().succ_opt().unwrap());
    }

    #[test]
    fn test_day_parts_zero_padded() {
        let ts = Local.with_ymd_and_hms(2021, 1, 5, 12, 0, 0).unwrap();
        assert_eq!(
            day_parts(&ts),
            ("2021".to_string(), "01".to_string(), "05".to_string())
        );
    }
}
