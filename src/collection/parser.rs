use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use tracing::{debug, trace};

use crate::{storage::entities::UsageRecord, utils::time::to_record_timestamp};

const DAILY_SECTION: &str = "In-memory daily stats";
const WEEKLY_SECTION: &str = "In-memory weekly stats";
const MONTHLY_SECTION: &str = "In-memory monthly stats";

static PACKAGE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"package=(\S+)").expect("package pattern is valid"));
static TIME_USED_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"totalTimeUsed="([^"]+)""#).expect("time pattern is valid"));

/// Converts `dumpsys usagestats` output into records. Only the daily section is read, and only
/// apps that were actually used end up in the result. Every record is stamped with
/// `collected_at`.
pub fn parse_usage_dump(raw: &str, collected_at: DateTime<Utc>) -> Vec<UsageRecord> {
    let timestamp = to_record_timestamp(collected_at);
    let mut records = vec![];

    let daily_lines = raw
        .lines()
        .skip_while(|line| !line.contains(DAILY_SECTION))
        .skip(1)
        .take_while(|line| !line.contains(WEEKLY_SECTION) && !line.contains(MONTHLY_SECTION));

    for line in daily_lines {
        if !line.contains("package=") || !line.contains("totalTimeUsed=") {
            continue;
        }
        let (Some(package), Some(time)) = (
            PACKAGE_PATTERN.captures(line).and_then(|c| c.get(1)),
            TIME_USED_PATTERN.captures(line).and_then(|c| c.get(1)),
        ) else {
            trace!("Unrecognized usage line {line}");
            continue;
        };

        let time_used_ms = parse_time_to_ms(time.as_str());
        if time_used_ms > 0 {
            records.push(UsageRecord::new(
                package.as_str(),
                time_used_ms,
                timestamp.clone(),
            ));
        }
    }

    debug!("Parsed {} usage records", records.len());
    records
}

/// Converts `HH:MM:SS` or `MM:SS` into milliseconds. Anything else is 0.
pub fn parse_time_to_ms(value: &str) -> u64 {
    let parts = value
        .split(':')
        .map(|part| part.trim().parse::<u64>())
        .collect::<Result<Vec<_>, _>>();

    let seconds = match parts.as_deref() {
        Ok([hours, minutes, seconds]) => hours
            .saturating_mul(3600)
            .saturating_add(minutes.saturating_mul(60))
            .saturating_add(*seconds),
        Ok([minutes, seconds]) => minutes.saturating_mul(60).saturating_add(*seconds),
        _ => 0,
    };
    seconds.saturating_mul(1000)
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::{parse_time_to_ms, parse_usage_dump};
    use crate::storage::entities::UsageRecord;

    const DUMP: &str = r#"
user=0
  In-memory daily stats
  timeRange="1/1/2024, 00:00 - 1/1/2024, 12:00"
  packages
    package=com.android.chrome totalTimeUsed="01:02:03" lastTimeUsed="2024-01-01 11:59:00"
    package=com.whatsapp totalTimeUsed="12:34" lastTimeUsed="2024-01-01 11:00:00"
    package=com.android.settings totalTimeUsed="00:00" lastTimeUsed="2024-01-01 09:00:00"
    package=com.broken totalTimeUsed="soon"
  In-memory weekly stats
    package=com.android.chrome totalTimeUsed="10:00:00" lastTimeUsed="2024-01-01 11:59:00"
"#;

    #[test]
    fn parses_daily_section_only() {
        let collected_at = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();

        let records = parse_usage_dump(DUMP, collected_at);

        assert_eq!(
            records,
            vec![
                UsageRecord::new("com.android.chrome", 3_723_000, "2024-01-01T12:00:00Z"),
                UsageRecord::new("com.whatsapp", 754_000, "2024-01-01T12:00:00Z"),
            ]
        );
    }

    #[test]
    fn monthly_section_also_ends_daily_stats() {
        let dump = "In-memory daily stats\n\
                    package=a totalTimeUsed=\"00:10\"\n\
                    In-memory monthly stats\n\
                    package=b totalTimeUsed=\"00:10\"\n";

        let records = parse_usage_dump(dump, Utc::now());

        assert_eq!(records.len(), 1);
        assert_eq!(&*records[0].package, "a");
    }

    #[test]
    fn no_daily_section_means_no_records() {
        let dump = "In-memory weekly stats\npackage=a totalTimeUsed=\"00:10\"\n";
        assert!(parse_usage_dump(dump, Utc::now()).is_empty());
        assert!(parse_usage_dump("", Utc::now()).is_empty());
    }

    #[test]
    fn time_formats() {
        assert_eq!(parse_time_to_ms("1:23:45"), 5_025_000);
        assert_eq!(parse_time_to_ms("12:34"), 754_000);
        assert_eq!(parse_time_to_ms("00:00"), 0);
        assert_eq!(parse_time_to_ms("42"), 0);
        assert_eq!(parse_time_to_ms("1:2:3:4"), 0);
        assert_eq!(parse_time_to_ms("a:b"), 0);
        assert_eq!(parse_time_to_ms("-1:30"), 0);
        assert_eq!(parse_time_to_ms(""), 0);
    }
}
