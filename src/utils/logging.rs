use std::{path::Path, sync::LazyLock};

use anyhow::{Context, Result};
use tracing::level_filters::LevelFilter;
use tracing_appender::rolling::Rotation;
use tracing_subscriber::{
    fmt::{format::FmtSpan, writer::MakeWriterExt},
    EnvFilter,
};

pub const CLI_PREFIX: &str = "cli";

const LOGS_DIR_NAME: &str = "logs";
const MAX_LOG_FILES: usize = 5;
const DEFAULT_LEVEL: &str = "info";

/// Installs the global subscriber. Logs go into a daily rotated file under
/// `application_data_path/logs`, and to stdout as well when `show_std` is set. Only this crate's
/// events are kept, at `log_level` or, failing that, at the level in `RUST_LOG`.
pub fn enable_logging(
    prefix: &str,
    application_data_path: &Path,
    log_level: Option<LevelFilter>,
    show_std: bool,
) -> Result<()> {
    let logs_dir = application_data_path.join(LOGS_DIR_NAME);
    let appender = tracing_appender::rolling::Builder::new()
        .rotation(Rotation::DAILY)
        .max_log_files(MAX_LOG_FILES)
        .filename_prefix(prefix)
        .build(&logs_dir)
        .with_context(|| format!("Failed to set up logging into {logs_dir:?}"))?;

    let stdout = std::io::stdout.with_filter(move |_| show_std);
    let directive = crate_directive(log_level, std::env::var("RUST_LOG").ok());

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(directive))
        .with_span_events(FmtSpan::CLOSE)
        .with_writer(stdout.and(appender))
        .with_ansi(false)
        .pretty()
        .init();
    Ok(())
}

/// Filter directive limiting output to this crate. An explicit level wins over the environment.
fn crate_directive(log_level: Option<LevelFilter>, env_level: Option<String>) -> String {
    let level = log_level
        .map(|v| v.to_string())
        .or(env_level)
        .unwrap_or_else(|| DEFAULT_LEVEL.into());
    format!("{}={level}", env!("CARGO_PKG_NAME").replace('-', "_"))
}

pub static TEST_LOGGING: LazyLock<()> = LazyLock::new(|| {
    tracing_subscriber::fmt()
        .with_max_level(LevelFilter::TRACE)
        .with_test_writer()
        .pretty()
        .init()
});
