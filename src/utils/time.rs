use chrono::{DateTime, Duration, NaiveDateTime, NaiveTime, SecondsFormat, TimeZone, Utc};

/// This is the standard way of writing a timestamp into the snapshot file.
pub fn to_record_timestamp(moment: DateTime<Utc>) -> String {
    moment.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Reads a snapshot timestamp. Accepts RFC 3339 as well as offset-less ISO-8601 values (those are
/// taken as UTC), since older snapshots were written without an offset.
pub fn parse_record_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(v) = DateTime::parse_from_rfc3339(value) {
        return Some(v.to_utc());
    }
    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|v| Utc.from_utc_datetime(&v))
}

/// Returns start of the next day.
pub fn next_day_start<Tz: TimeZone>(date: DateTime<Tz>) -> DateTime<Tz> {
    let next = date.clone() + Duration::days(1);
    next.with_time(NaiveTime::MIN).single().unwrap_or(next)
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, TimeZone, Utc};

    use super::{next_day_start, parse_record_timestamp, to_record_timestamp};

    #[test]
    fn timestamps_are_written_in_utc() {
        let moment = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        assert_eq!(to_record_timestamp(moment), "2024-01-01T12:00:00Z");
    }

    #[test]
    fn parses_rfc3339_and_naive_timestamps() {
        let expected = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(parse_record_timestamp("2024-01-01T00:00:00Z"), Some(expected));
        assert_eq!(
            parse_record_timestamp("2024-01-01T02:00:00+02:00"),
            Some(expected)
        );
        assert_eq!(
            parse_record_timestamp("2024-01-01T00:00:00.000000"),
            Some(expected)
        );
        assert_eq!(parse_record_timestamp("yesterday"), None);
        assert_eq!(parse_record_timestamp(""), None);
    }

    #[test]
    fn next_day_start_rolls_over() {
        let moment = Utc.with_ymd_and_hms(2024, 2, 28, 17, 30, 0).unwrap();
        let next = next_day_start(moment);
        assert_eq!(next.date_naive(), NaiveDate::from_ymd_opt(2024, 2, 29).unwrap());
        assert_eq!(next.time(), chrono::NaiveTime::MIN);
    }
}
