//! Contains logic for talking to an Android device through the device bridge tool.
//! [adb::AdbBridge] is the main artifact of this module; everything else talks to it through
//! [DeviceBridge] so that it can be replaced in tests.

pub mod adb;

use std::{num::NonZeroU32, process::ExitStatus, time::Duration};

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("`{program}` could not be started: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{command}` did not finish within {timeout:?}")]
    Timeout { command: String, timeout: Duration },

    #[error("`{command}` exited with {status}: {stderr}")]
    CommandFailed {
        command: String,
        status: ExitStatus,
        stderr: String,
    },
}

/// Intended to serve as a contract any device bridge implementation must follow.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DeviceBridge: Send + Sync {
    /// Whether the bridge tool can be run at all.
    async fn is_available(&self) -> bool;

    /// Identifiers of connected and authorized devices. Empty means nothing is connected.
    async fn list_devices(&self) -> Result<Vec<String>, BridgeError>;

    /// Raw usage statistics dump covering roughly the last `window_days` days.
    async fn fetch_usage_dump(
        &self,
        device: &str,
        window_days: NonZeroU32,
    ) -> Result<String, BridgeError>;

    /// Installed package identifiers.
    async fn list_packages(&self, device: &str) -> Result<Vec<String>, BridgeError>;

    /// Screen on time as reported by the device, if it reports one.
    async fn screen_on_time(&self, device: &str) -> Result<Option<String>, BridgeError>;
}
