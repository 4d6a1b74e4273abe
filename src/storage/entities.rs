use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use tracing::warn;

use crate::utils::time::parse_record_timestamp;

/// Package used for records that arrive without one.
pub const UNKNOWN_PACKAGE: &str = "unknown";

/// One measured amount of foreground time for a single app package. Several records may share a
/// package, one per collection run.
#[derive(PartialEq, Eq, Debug, Serialize, Deserialize, Clone)]
pub struct UsageRecord {
    #[serde(default = "unknown_package", deserialize_with = "lenient_package")]
    pub package: Arc<str>,
    #[serde(default, deserialize_with = "lenient_ms")]
    pub time_used_ms: u64,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub timestamp: String,
    #[serde(
        default,
        deserialize_with = "lenient_optional_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub app_name: Option<String>,
}

impl UsageRecord {
    pub fn new(package: impl Into<Arc<str>>, time_used_ms: u64, timestamp: impl Into<String>) -> Self {
        Self {
            package: package.into(),
            time_used_ms,
            timestamp: timestamp.into(),
            app_name: None,
        }
    }

    pub fn with_app_name(self, app_name: impl Into<String>) -> Self {
        Self {
            app_name: Some(app_name.into()),
            ..self
        }
    }

    /// Parsed [UsageRecord::timestamp]. Records written by other tools might carry anything in
    /// there, so this is optional.
    pub fn moment(&self) -> Option<DateTime<Utc>> {
        parse_record_timestamp(&self.timestamp)
    }
}

/// Everything persisted in the snapshot file.
#[derive(PartialEq, Eq, Debug, Default, Serialize, Deserialize, Clone)]
pub struct UsageSnapshot {
    #[serde(default, deserialize_with = "lenient_records")]
    pub records: Vec<UsageRecord>,
    #[serde(default, deserialize_with = "lenient_optional_string")]
    pub last_updated: Option<String>,
}

impl UsageSnapshot {
    /// Records with a timestamp inside `[start, end]`. Records whose timestamp can't be read are
    /// left out.
    pub fn records_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> impl Iterator<Item = &UsageRecord> {
        self.records
            .iter()
            .filter(move |record| matches!(record.moment(), Some(v) if start <= v && v <= end))
    }
}

fn unknown_package() -> Arc<str> {
    UNKNOWN_PACKAGE.into()
}

fn lenient_package<'de, D>(deserializer: D) -> Result<Arc<str>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(s)) if !s.is_empty() => s.into(),
        _ => unknown_package(),
    })
}

/// Bad durations count as nothing. Negative, fractional below zero, `null`, strings and other
/// shapes all become 0, positive fractions are truncated.
fn lenient_ms<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    let ms = match value {
        Some(serde_json::Value::Number(n)) => n
            .as_u64()
            .or_else(|| n.as_i64().map(|_| 0))
            .or_else(|| n.as_f64().map(|v| if v > 0. { v as u64 } else { 0 }))
            .unwrap_or(0),
        _ => 0,
    };
    Ok(ms)
}

/// Anything but a string is kept as an empty timestamp, which no range ever matches.
fn lenient_timestamp<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(s)) => s,
        _ => String::new(),
    })
}

/// Optional text fields. Non-string values are dropped.
fn lenient_optional_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(s)) => Some(s),
        _ => None,
    })
}

/// Drops entries that aren't records at all instead of failing the whole snapshot.
fn lenient_records<'de, D>(deserializer: D) -> Result<Vec<UsageRecord>, D::Error>
where
    D: Deserializer<'de>,
{
    let values = Option::<Vec<serde_json::Value>>::deserialize(deserializer)?.unwrap_or_default();
    let mut records = Vec::with_capacity(values.len());
    for value in values {
        match serde_json::from_value::<UsageRecord>(value) {
            Ok(v) => records.push(v),
            Err(e) => warn!("Skipping malformed usage record: {e}"),
        }
    }
    Ok(records)
}
