use std::{collections::HashMap, num::NonZeroU32, sync::Arc};

use serde::Serialize;

use crate::storage::entities::UsageRecord;

pub const MS_PER_HOUR: u64 = 3_600_000;
pub const MS_PER_MINUTE: u64 = 60_000;

/// Standard collection period, used when no other window is known.
pub const DEFAULT_WINDOW_DAYS: NonZeroU32 = match NonZeroU32::new(7) {
    Some(v) => v,
    None => panic!("7 is not zero"),
};

/// How many apps charts show by default.
pub const DEFAULT_TOP_N: usize = 10;

/// Total usage of a single package. Never stored, always derived from records.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AppSummary {
    pub package: Arc<str>,
    pub total_time_ms: u64,
    pub total_time_hours: f64,
}

impl AppSummary {
    fn new(package: Arc<str>, total_time_ms: u64) -> Self {
        Self {
            package,
            total_time_ms,
            total_time_hours: total_time_ms as f64 / MS_PER_HOUR as f64,
        }
    }
}

/// Returns one summary per unique package, most used first. Packages with equal totals stay in
/// the order they were first seen.
pub fn summarize<'a>(records: impl IntoIterator<Item = &'a UsageRecord>) -> Vec<AppSummary> {
    let mut positions = HashMap::<Arc<str>, usize>::new();
    let mut totals = Vec::<(Arc<str>, u64)>::new();

    for record in records {
        let index = *positions.entry(record.package.clone()).or_insert_with(|| {
            totals.push((record.package.clone(), 0));
            totals.len() - 1
        });
        totals[index].1 = totals[index].1.saturating_add(record.time_used_ms);
    }

    let mut summary = totals
        .into_iter()
        .map(|(package, total)| AppSummary::new(package, total))
        .collect::<Vec<_>>();
    // sort_by is stable, which is what keeps ties in input order
    summary.sort_by(|a, b| b.total_time_ms.cmp(&a.total_time_ms));
    summary
}

pub fn total_time<'a>(records: impl IntoIterator<Item = &'a UsageRecord>) -> u64 {
    records
        .into_iter()
        .fold(0u64, |acc, record| acc.saturating_add(record.time_used_ms))
}

/// Renders `1h 30m`, or just `30m` below an hour. Seconds are dropped, not rounded.
pub fn format_duration(ms: u64) -> String {
    let hours = ms / MS_PER_HOUR;
    let minutes = (ms % MS_PER_HOUR) / MS_PER_MINUTE;
    if hours > 0 {
        format!("{hours}h {minutes}m")
    } else {
        format!("{minutes}m")
    }
}

/// Average usage per day over `window_days`, in milliseconds.
pub fn average_daily<'a>(
    records: impl IntoIterator<Item = &'a UsageRecord>,
    window_days: NonZeroU32,
) -> f64 {
    total_time(records) as f64 / window_days.get() as f64
}

pub fn top_n(summary: &[AppSummary], n: usize) -> &[AppSummary] {
    &summary[..n.min(summary.len())]
}
