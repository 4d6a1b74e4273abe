use std::{fmt::Display, io::Write, num::NonZeroU32, path::PathBuf};

use anyhow::Result;
use chrono::{DateTime, Local, Utc};
use chrono_english::parse_date_string;
use clap::{CommandFactory, Parser, ValueEnum};
use now::DateTimeNow;

use crate::{
    storage::{
        entities::{UsageRecord, UsageSnapshot},
        snapshot_storage::{SnapshotStorage, SnapshotStorageImpl},
    },
    utils::{clock::DefaultClock, share::UsageShare, time::next_day_start},
};

use super::{
    output::{
        analysis::{DEFAULT_TOP_N, DEFAULT_WINDOW_DAYS},
        render_report, ChartPalette, ReportConfig, UsageReport, NO_DATA_MESSAGE,
    },
    Args,
};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum DateStyle {
    Uk,
    Us,
}

impl From<DateStyle> for chrono_english::Dialect {
    fn from(value: DateStyle) -> Self {
        match value {
            DateStyle::Uk => Self::Uk,
            DateStyle::Us => Self::Us,
        }
    }
}

impl Display for DateStyle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DateStyle::Uk => write!(f, "uk"),
            DateStyle::Us => write!(f, "us"),
        }
    }
}

#[derive(Debug, Parser)]
pub struct ReportCommand {
    #[arg(short = 'n', long, default_value_t = DEFAULT_TOP_N, help = "How many apps to show")]
    top: usize,
    #[arg(
        long,
        default_value_t = DEFAULT_WINDOW_DAYS,
        help = "Number of days the daily average is spread over"
    )]
    days: NonZeroU32,
    #[arg(
        long = "start",
        short,
        help = "Only records collected after this. Examples are \"yesterday\", \"1 week ago\", \"15/03/2025\""
    )]
    start_date: Option<String>,
    #[arg(
        long = "end",
        short,
        help = "Only records collected before this. Examples are \"yesterday\", \"1 hour ago\", \"15/03/2025\""
    )]
    end_date: Option<String>,
    #[arg(long, default_value_t = DateStyle::Uk, help = "Style of dates used during parsing. For Uk it's day/month/year. For Us it's month/day/year")]
    date_style: DateStyle,
    #[arg(
        long = "whole-days",
        default_value_t = false,
        help = "Take start and end as whole days. For example if both are 15/03/2025 the whole day is included"
    )]
    whole_days: bool,
    #[arg(short, long, help = "Only records of this package")]
    package: Option<String>,
    #[arg(long = "min-share", help = "Hide apps below this share of total usage", default_value_t = UsageShare::NONE)]
    min_share: UsageShare,
    #[arg(long, help = "Print the report as JSON")]
    json: bool,
    #[arg(long = "no-color", help = "Don't colour chart bars")]
    no_color: bool,
}

/// Command to process `report` command. Loads the snapshot, narrows it down to the requested
/// records and prints the most used apps.
pub async fn process_report_command(command: ReportCommand, snapshot_path: PathBuf) -> Result<()> {
    write_report(
        command,
        snapshot_path,
        &mut std::io::stdout(),
        &mut std::io::stderr(),
    )
    .await
}

/// Messages go to `err` in `--json` mode so that `out` stays valid JSON.
async fn write_report(
    ReportCommand {
        top,
        days,
        start_date,
        end_date,
        date_style,
        whole_days,
        package,
        min_share,
        json,
        no_color,
    }: ReportCommand,
    snapshot_path: PathBuf,
    out: &mut impl Write,
    err: &mut impl Write,
) -> Result<()> {
    let range = parse_range(start_date, end_date, date_style, whole_days)?;
    let no_data: &mut dyn Write = if json { &mut *err } else { &mut *out };

    let storage = SnapshotStorageImpl::new(snapshot_path, Box::new(DefaultClock))?;
    let Some(snapshot) = storage.load().await? else {
        writeln!(no_data, "{NO_DATA_MESSAGE}")?;
        return Ok(());
    };

    let records = select_records(&snapshot, range, package.as_deref());
    if records.is_empty() {
        writeln!(no_data, "{NO_DATA_MESSAGE}")?;
        return Ok(());
    }

    let report = UsageReport::build(
        &records,
        snapshot.last_updated.clone(),
        &ReportConfig {
            window_days: days,
            top,
            min_share,
        },
    );

    if json {
        writeln!(out, "{}", serde_json::to_string_pretty(&report)?)?;
    } else {
        let palette = if no_color {
            ChartPalette::monochrome()
        } else {
            ChartPalette::default()
        };
        write!(out, "{}", render_report(&report, &palette))?;
    }
    Ok(())
}

fn select_records<'a>(
    snapshot: &'a UsageSnapshot,
    range: Option<(DateTime<Utc>, DateTime<Utc>)>,
    package: Option<&str>,
) -> Vec<&'a UsageRecord> {
    let mut records = match range {
        Some((start, end)) => snapshot.records_between(start, end).collect::<Vec<_>>(),
        None => snapshot.records.iter().collect(),
    };
    if let Some(package) = package {
        records.retain(|record| &*record.package == package);
    }
    records
}

/// Unset bounds are open. Returns `None` when there is no bound at all.
fn parse_range(
    start_date: Option<String>,
    end_date: Option<String>,
    date_style: DateStyle,
    whole_days: bool,
) -> Result<Option<(DateTime<Utc>, DateTime<Utc>)>> {
    if start_date.is_none() && end_date.is_none() {
        return Ok(None);
    }

    let now = Local::now();
    let dialect: chrono_english::Dialect = date_style.into();
    let parse = |value: Option<String>, name: &str| -> Result<Option<DateTime<Local>>> {
        match value.map(|s| parse_date_string(&s, now, dialect)) {
            Some(Ok(v)) => Ok(Some(v.with_timezone(&Local))),
            Some(Err(e)) => Err(Args::command()
                .error(
                    clap::error::ErrorKind::ValueValidation,
                    format!("Failed to validate {name} date {e}"),
                )
                .into()),
            None => Ok(None),
        }
    };

    let mut start = parse(start_date, "start")?;
    let mut end = parse(end_date, "end")?;
    if whole_days {
        start = start.map(|v| v.beginning_of_day());
        end = end.map(next_day_start);
    }

    Ok(Some((
        start.map_or(DateTime::<Utc>::MIN_UTC, |v| v.to_utc()),
        end.map_or(DateTime::<Utc>::MAX_UTC, |v| v.to_utc()),
    )))
}
