use std::{
    num::NonZeroU32,
    path::PathBuf,
    process::Stdio,
    time::Duration,
};

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info, instrument, warn};

use super::{BridgeError, DeviceBridge};

/// Quick commands, like listing devices.
const SHORT_TIMEOUT: Duration = Duration::from_secs(5);
/// Anything that runs `dumpsys` on the device.
const DUMP_TIMEOUT: Duration = Duration::from_secs(30);

/// [DeviceBridge] backed by the `adb` executable.
pub struct AdbBridge {
    program: PathBuf,
}

impl AdbBridge {
    pub fn new(program: PathBuf) -> Self {
        Self { program }
    }

    async fn run(&self, args: &[&str], timeout: Duration) -> Result<String, BridgeError> {
        let command_line = format!("{} {}", self.program.display(), args.join(" "));
        debug!("Running {command_line}");

        let mut command = Command::new(&self.program);
        command
            .args(args)
            .stdin(Stdio::null())
            .kill_on_drop(true);

        let output = tokio::time::timeout(timeout, command.output())
            .await
            .map_err(|_| BridgeError::Timeout {
                command: command_line.clone(),
                timeout,
            })?
            .map_err(|source| BridgeError::Spawn {
                program: self.program.display().to_string(),
                source,
            })?;

        if !output.status.success() {
            return Err(BridgeError::CommandFailed {
                command: command_line,
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    async fn run_on_device(
        &self,
        device: &str,
        args: &[&str],
        timeout: Duration,
    ) -> Result<String, BridgeError> {
        let mut full = vec!["-s", device];
        full.extend_from_slice(args);
        self.run(&full, timeout).await
    }
}

#[async_trait]
impl DeviceBridge for AdbBridge {
    async fn is_available(&self) -> bool {
        match self.run(&["version"], SHORT_TIMEOUT).await {
            Ok(version) => {
                debug!("Found {}", version.lines().next().unwrap_or_default());
                true
            }
            Err(e) => {
                warn!("Device bridge is not usable: {e}");
                false
            }
        }
    }

    async fn list_devices(&self) -> Result<Vec<String>, BridgeError> {
        let output = self.run(&["devices"], SHORT_TIMEOUT).await?;
        Ok(parse_device_list(&output))
    }

    #[instrument(skip(self))]
    async fn fetch_usage_dump(
        &self,
        device: &str,
        window_days: NonZeroU32,
    ) -> Result<String, BridgeError> {
        // dumpsys has no notion of a window, the daily section is picked out while parsing.
        info!("Requesting usage stats for the last {window_days} days");
        self.run_on_device(device, &["shell", "dumpsys", "usagestats"], DUMP_TIMEOUT)
            .await
    }

    async fn list_packages(&self, device: &str) -> Result<Vec<String>, BridgeError> {
        let output = self
            .run_on_device(device, &["shell", "pm", "list", "packages"], DUMP_TIMEOUT)
            .await?;
        Ok(parse_package_list(&output))
    }

    async fn screen_on_time(&self, device: &str) -> Result<Option<String>, BridgeError> {
        let output = self
            .run_on_device(device, &["shell", "dumpsys", "battery"], DUMP_TIMEOUT)
            .await?;
        Ok(parse_screen_on_time(&output))
    }
}

/// Reads the output of `adb devices`. Only devices in the `device` state are usable, so
/// unauthorized or offline ones are left out, as are the header and daemon startup notices.
pub fn parse_device_list(output: &str) -> Vec<String> {
    output
        .lines()
        .filter_map(|line| {
            let mut columns = line.split_whitespace();
            match (columns.next(), columns.next()) {
                (Some(serial), Some("device")) => Some(serial.to_string()),
                _ => None,
            }
        })
        .collect()
}

pub fn parse_package_list(output: &str) -> Vec<String> {
    output
        .lines()
        .filter_map(|line| line.trim().strip_prefix("package:"))
        .map(|package| package.to_string())
        .collect()
}

pub fn parse_screen_on_time(output: &str) -> Option<String> {
    output
        .lines()
        .find_map(|line| line.split_once("Screen on:"))
        .map(|(_, value)| value.trim().to_string())
}
