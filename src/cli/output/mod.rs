pub mod analysis;

use std::{fmt::Write, num::NonZeroU32};

use ansi_term::Colour;
use serde::Serialize;

use crate::{
    storage::entities::UsageRecord,
    utils::share::UsageShare,
};

use analysis::{average_daily, format_duration, summarize, top_n, total_time, AppSummary};

pub const NO_DATA_MESSAGE: &str =
    "No usage data found. Connect a device and run `phoneusage collect` first.";

/// Width of the longest bar in characters.
const BAR_WIDTH: usize = 30;

/// Ordered colours used for chart bars. Entries are assigned in rank order and the palette
/// repeats when there are more entries than colours. An empty palette means no colouring.
#[derive(Debug, Clone, PartialEq)]
pub struct ChartPalette {
    colours: Vec<Colour>,
}

impl ChartPalette {
    pub fn new(colours: Vec<Colour>) -> Self {
        Self { colours }
    }

    pub fn monochrome() -> Self {
        Self { colours: vec![] }
    }

    pub fn colour_for(&self, index: usize) -> Option<Colour> {
        if self.colours.is_empty() {
            None
        } else {
            Some(self.colours[index % self.colours.len()])
        }
    }
}

impl Default for ChartPalette {
    fn default() -> Self {
        Self::new(vec![
            Colour::RGB(255, 99, 132),
            Colour::RGB(54, 162, 235),
            Colour::RGB(255, 206, 86),
            Colour::RGB(75, 192, 192),
            Colour::RGB(153, 102, 255),
            Colour::RGB(255, 159, 64),
        ])
    }
}

pub struct ReportConfig {
    pub window_days: NonZeroU32,
    pub top: usize,
    pub min_share: UsageShare,
}

/// Everything the dashboard reads. Also what `report --json` prints.
#[derive(Debug, Serialize)]
pub struct UsageReport {
    pub last_updated: Option<String>,
    pub window_days: NonZeroU32,
    pub record_count: usize,
    pub total_time_ms: u64,
    pub total_time: String,
    pub average_daily_ms: f64,
    pub apps: Vec<AppSummary>,
}

impl UsageReport {
    pub fn build(
        records: &[&UsageRecord],
        last_updated: Option<String>,
        config: &ReportConfig,
    ) -> Self {
        let total_time_ms = total_time(records.iter().copied());
        let mut summary = summarize(records.iter().copied());
        summary.retain(|v| UsageShare::of(v.total_time_ms, total_time_ms) >= config.min_share);

        Self {
            last_updated,
            window_days: config.window_days,
            record_count: records.len(),
            total_time_ms,
            total_time: format_duration(total_time_ms),
            average_daily_ms: average_daily(records.iter().copied(), config.window_days),
            apps: top_n(&summary, config.top).to_vec(),
        }
    }
}

/// Renders a report as text, one ranked app per line.
pub fn render_report(report: &UsageReport, palette: &ChartPalette) -> String {
    let mut output = String::new();
    if let Some(last_updated) = report.last_updated.as_ref() {
        let _ = writeln!(output, "Last updated: {last_updated}");
    }
    let _ = writeln!(
        output,
        "Total: {} across {} records",
        report.total_time, report.record_count
    );
    let _ = writeln!(
        output,
        "Daily average over {} days: {}",
        report.window_days,
        format_duration(report.average_daily_ms as u64)
    );
    output.push('\n');

    let longest = report.apps.first().map_or(0, |v| v.total_time_ms);
    for (index, entry) in report.apps.iter().enumerate() {
        let bar = "█".repeat(bar_width(entry.total_time_ms, longest));
        let bar = match palette.colour_for(index) {
            Some(colour) => colour.paint(bar).to_string(),
            None => bar,
        };
        let _ = writeln!(
            output,
            "{}\t{}%\t{}\t{:.2}h\t{}\t{}",
            index + 1,
            UsageShare::of(entry.total_time_ms, report.total_time_ms).whole_percent(),
            format_duration(entry.total_time_ms),
            entry.total_time_hours,
            entry.package,
            bar
        );
    }
    output
}

fn bar_width(value_ms: u64, longest_ms: u64) -> usize {
    if longest_ms == 0 || value_ms == 0 {
        return 0;
    }
    let width = (value_ms as f64 / longest_ms as f64 * BAR_WIDTH as f64).round() as usize;
    width.max(1)
}
