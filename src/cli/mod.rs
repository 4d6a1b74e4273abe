pub mod collect;
pub mod manage;
pub mod output;
pub mod report;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use collect::{
    process_collect_command, process_devices_command, process_packages_command,
    process_screen_time_command, CollectCommand, DeviceCommand,
};
use manage::{process_clear_command, process_export_command};
use report::{process_report_command, ReportCommand};
use tracing::level_filters::LevelFilter;

use crate::utils::{
    dir::{create_application_default_path, ensure_dir, SNAPSHOT_FILE_NAME},
    logging::{enable_logging, CLI_PREFIX},
};

#[derive(Parser, Debug)]
#[command(name = "phoneusage", version, long_about = None)]
#[command(about = "Collects Android app usage statistics over adb and reports them", long_about = None)]
struct Args {
    #[command(subcommand)]
    commands: Commands,
    #[arg(
        long,
        global = true,
        help = "Application directory. By default tries to save into $XDG_STATE_HOME or $HOME/.local/state"
    )]
    dir: Option<PathBuf>,
    #[arg(long, global = true, help = "Enable logging")]
    log: bool,
}

#[derive(Subcommand, Debug)]
#[command(version, about, long_about = None)]
enum Commands {
    #[command(about = "Collect app usage data from a connected device and store it")]
    Collect {
        #[command(flatten)]
        command: CollectCommand,
    },
    #[command(about = "List connected devices")]
    Devices {
        #[command(flatten)]
        bridge: BridgeOptions,
    },
    #[command(about = "List packages installed on a device")]
    Packages {
        #[command(flatten)]
        command: DeviceCommand,
    },
    #[command(about = "Show screen on time reported by a device")]
    ScreenTime {
        #[command(flatten)]
        command: DeviceCommand,
    },
    #[command(about = "Show most used apps from the stored data")]
    Report {
        #[command(flatten)]
        command: ReportCommand,
    },
    #[command(about = "Export stored records as CSV")]
    Export {
        #[arg(help = "Destination file")]
        output: PathBuf,
    },
    #[command(about = "Remove all stored records")]
    Clear {
        #[arg(long, help = "Confirm removal")]
        yes: bool,
        #[arg(long, help = "Also empty the snapshot copy written by `collect --mirror`")]
        mirror: Option<PathBuf>,
    },
}

/// Where to find the device bridge executable.
#[derive(Debug, Clone, clap::Args)]
pub struct BridgeOptions {
    #[arg(
        long = "adb",
        env = "PHONEUSAGE_ADB",
        default_value = "adb",
        help = "Path to the adb executable"
    )]
    pub program: PathBuf,
}

pub async fn run_cli() -> Result<()> {
    let args = Args::parse();

    let app_dir = args
        .dir
        .map_or_else(create_application_default_path, ensure_dir)?;

    let logging_level = if args.log {
        Some(LevelFilter::TRACE)
    } else {
        None
    };
    enable_logging(CLI_PREFIX, &app_dir, logging_level, args.log)?;

    let snapshot_path = app_dir.join(SNAPSHOT_FILE_NAME);

    match args.commands {
        Commands::Collect { command } => process_collect_command(command, snapshot_path).await,
        Commands::Devices { bridge } => process_devices_command(bridge).await,
        Commands::Packages { command } => process_packages_command(command).await,
        Commands::ScreenTime { command } => process_screen_time_command(command).await,
        Commands::Report { command } => process_report_command(command, snapshot_path).await,
        Commands::Export { output } => process_export_command(output, snapshot_path).await,
        Commands::Clear { yes, mirror } => process_clear_command(yes, mirror, snapshot_path).await,
    }
}

#[cfg(test)]
mod tests {
    use clap::{CommandFactory, Parser};

    use super::{Args, Commands};

    #[test]
    fn command_line_is_consistent() {
        Args::command().debug_assert();
    }

    #[test]
    fn global_options_after_subcommand() {
        let args = Args::try_parse_from(["phoneusage", "report", "--dir", "/tmp/x", "--log"]).unwrap();

        assert!(args.log);
        assert_eq!(args.dir.as_deref(), Some(std::path::Path::new("/tmp/x")));
        assert!(matches!(args.commands, Commands::Report { .. }));
    }

    #[test]
    fn collect_defaults() {
        let args = Args::try_parse_from(["phoneusage", "collect", "--adb", "/opt/adb"]).unwrap();

        let Commands::Collect { command } = args.commands else {
            panic!("expected collect");
        };
        assert_eq!(command.days.get(), 7);
        assert_eq!(command.device, None);
        assert_eq!(command.bridge.program, std::path::PathBuf::from("/opt/adb"));
    }

    #[test]
    fn clear_takes_mirror() {
        let args =
            Args::try_parse_from(["phoneusage", "clear", "--yes", "--mirror", "/tmp/m.json"]).unwrap();

        let Commands::Clear { yes, mirror } = args.commands else {
            panic!("expected clear");
        };
        assert!(yes);
        assert_eq!(mirror, Some(std::path::PathBuf::from("/tmp/m.json")));
    }

    #[test]
    fn zero_day_window_is_rejected() {
        assert!(Args::try_parse_from(["phoneusage", "collect", "--days", "0"]).is_err());
    }
}
