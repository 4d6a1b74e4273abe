use std::{num::NonZeroU32, path::PathBuf};

use anyhow::{bail, Result};
use clap::Parser;
use tracing::error;

use crate::{
    bridge::{adb::AdbBridge, DeviceBridge},
    collection::{CollectionError, UsageCollector},
    storage::snapshot_storage::{SnapshotStorage, SnapshotStorageImpl},
    utils::clock::DefaultClock,
};

use super::{
    output::analysis::{summarize, top_n, DEFAULT_WINDOW_DAYS},
    BridgeOptions,
};

/// How many apps are listed after a successful collection.
const COLLECTED_SUMMARY_SIZE: usize = 5;

#[derive(Debug, Parser)]
pub struct CollectCommand {
    #[arg(long, default_value_t = DEFAULT_WINDOW_DAYS, help = "Number of days of usage data to collect")]
    pub days: NonZeroU32,
    #[arg(long, help = "Specific device ID to connect to. Defaults to the first connected device")]
    pub device: Option<String>,
    #[arg(
        long,
        help = "Also write the snapshot here, for example into the dashboard's public/data directory"
    )]
    pub mirror: Option<PathBuf>,
    #[command(flatten)]
    pub bridge: BridgeOptions,
}

#[derive(Debug, Parser)]
pub struct DeviceCommand {
    #[arg(long, help = "Specific device ID to connect to. Defaults to the first connected device")]
    pub device: Option<String>,
    #[command(flatten)]
    pub bridge: BridgeOptions,
}

fn create_collector(bridge: BridgeOptions) -> UsageCollector<AdbBridge> {
    UsageCollector::new(AdbBridge::new(bridge.program), Box::new(DefaultClock))
}

/// Command to process `collect` command. Pulls usage statistics off a device, appends them to the
/// snapshot and prints the most used apps.
pub async fn process_collect_command(
    CollectCommand {
        days,
        device,
        mirror,
        bridge,
    }: CollectCommand,
    snapshot_path: PathBuf,
) -> Result<()> {
    let collector = create_collector(bridge);

    println!("Connecting to device...");
    println!("Collecting usage data for the last {days} days...");
    let outcome = match collector.collect(device.as_deref(), days).await {
        Ok(v) => v,
        Err(e) => {
            print_collection_hints(&e);
            return Err(e.into());
        }
    };
    println!("Connected to: {}", outcome.device);

    if outcome.records.is_empty() {
        println!("WARNING: No usage data retrieved");
        println!("This may be due to:");
        println!("  1. No apps have been used");
        println!("  2. Usage stats permission not granted");
        println!("  3. Android version compatibility issues");
        bail!("No usage data retrieved from {}", outcome.device);
    }
    println!("Retrieved {} usage records", outcome.records.len());

    let storage = SnapshotStorageImpl::new(snapshot_path, Box::new(DefaultClock))?.with_mirror(mirror);
    let snapshot = storage.append(outcome.records).await?;
    println!("Data saved successfully to: {}", storage.path().display());
    println!("Total records in storage: {}", snapshot.records.len());

    let summary = summarize(&snapshot.records);
    println!();
    println!("Top {COLLECTED_SUMMARY_SIZE} most used apps:");
    for (index, entry) in top_n(&summary, COLLECTED_SUMMARY_SIZE).iter().enumerate() {
        println!(
            "  {}. {}: {:.2} hours",
            index + 1,
            entry.package,
            entry.total_time_hours
        );
    }
    Ok(())
}

fn print_collection_hints(e: &CollectionError) {
    error!("Collection failed {e:?}");
    match e {
        CollectionError::BridgeUnavailable => {
            println!("ERROR: adb is not installed or not in PATH");
            println!("Please install Android SDK Platform Tools or pass --adb");
        }
        CollectionError::NoDevices | CollectionError::DeviceNotFound { .. } => {
            println!("ERROR: Failed to connect to device: {e}");
            println!("Make sure:");
            println!("  1. Device is connected via USB");
            println!("  2. USB debugging is enabled");
            println!("  3. Device is authorized (check device screen)");
            println!();
            println!("Run `phoneusage devices` to see available devices");
        }
        CollectionError::Bridge(_) => {
            println!("ERROR: {e}");
        }
    }
}

pub async fn process_devices_command(bridge: BridgeOptions) -> Result<()> {
    let bridge = AdbBridge::new(bridge.program);
    if !bridge.is_available().await {
        return Err(CollectionError::BridgeUnavailable.into());
    }

    let devices = bridge.list_devices().await?;
    if devices.is_empty() {
        println!("No devices connected");
    } else {
        println!("Found {} connected device(s):", devices.len());
        for device in devices {
            println!("  - {device}");
        }
    }
    Ok(())
}

pub async fn process_packages_command(
    DeviceCommand { device, bridge }: DeviceCommand,
) -> Result<()> {
    let collector = create_collector(bridge);
    let device = collector.select_device(device.as_deref()).await?;

    let packages = collector.bridge().list_packages(&device).await?;
    for package in &packages {
        println!("{package}");
    }
    println!("{} packages installed on {device}", packages.len());
    Ok(())
}

pub async fn process_screen_time_command(
    DeviceCommand { device, bridge }: DeviceCommand,
) -> Result<()> {
    let collector = create_collector(bridge);
    let device = collector.select_device(device.as_deref()).await?;

    match collector.bridge().screen_on_time(&device).await? {
        Some(time) => println!("Screen on: {time}"),
        None => println!("Screen on time: N/A"),
    }
    Ok(())
}
