use super::entities::UsageRecord;

const CSV_HEADER: &str = "package,time_used_ms,timestamp,app_name";

/// Renders records as CSV. Returns `None` when there is nothing to export.
pub fn records_to_csv(records: &[UsageRecord]) -> Option<String> {
    if records.is_empty() {
        return None;
    }

    let mut output = String::from(CSV_HEADER);
    output.push('\n');
    for record in records {
        let fields = [
            escape_field(&record.package),
            record.time_used_ms.to_string(),
            escape_field(&record.timestamp),
            escape_field(record.app_name.as_deref().unwrap_or_default()),
        ];
        output.push_str(&fields.join(","));
        output.push('\n');
    }
    Some(output)
}

/// Quotes a field that contains a comma, quote or line break.
fn escape_field(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}
