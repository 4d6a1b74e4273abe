pub mod parser;

use std::num::NonZeroU32;

use thiserror::Error;
use tracing::{info, info_span, Instrument};

use crate::{
    bridge::{BridgeError, DeviceBridge},
    storage::entities::UsageRecord,
    utils::clock::Clock,
};

#[derive(Debug, Error)]
pub enum CollectionError {
    #[error("the device bridge tool is not installed or not in PATH")]
    BridgeUnavailable,

    #[error("no devices connected")]
    NoDevices,

    #[error("device {requested} not found, connected devices: {}", available.join(", "))]
    DeviceNotFound {
        requested: String,
        available: Vec<String>,
    },

    #[error(transparent)]
    Bridge(#[from] BridgeError),
}

/// Result of one collection run.
#[derive(Debug)]
pub struct CollectionOutcome {
    pub device: String,
    pub records: Vec<UsageRecord>,
}

/// Drives a single collection run: pick a device, dump its usage statistics and turn them into
/// records.
pub struct UsageCollector<B: DeviceBridge> {
    bridge: B,
    time_provider: Box<dyn Clock>,
}

impl<B: DeviceBridge> UsageCollector<B> {
    pub fn new(bridge: B, time_provider: Box<dyn Clock>) -> Self {
        Self {
            bridge,
            time_provider,
        }
    }

    pub fn bridge(&self) -> &B {
        &self.bridge
    }

    /// Picks `requested` if it's connected, otherwise the first connected device.
    pub async fn select_device(&self, requested: Option<&str>) -> Result<String, CollectionError> {
        if !self.bridge.is_available().await {
            return Err(CollectionError::BridgeUnavailable);
        }

        let mut devices = self.bridge.list_devices().await?;
        if devices.is_empty() {
            return Err(CollectionError::NoDevices);
        }

        match requested {
            Some(requested) if devices.iter().any(|v| v == requested) => Ok(requested.to_string()),
            Some(requested) => Err(CollectionError::DeviceNotFound {
                requested: requested.to_string(),
                available: devices,
            }),
            None => Ok(devices.swap_remove(0)),
        }
    }

    pub async fn collect(
        &self,
        requested: Option<&str>,
        window_days: NonZeroU32,
    ) -> Result<CollectionOutcome, CollectionError> {
        let device = self.select_device(requested).await?;
        info!("Connected to device {device}");

        let span = info_span!("Collecting usage", device = %device);
        let dump = self
            .bridge
            .fetch_usage_dump(&device, window_days)
            .instrument(span)
            .await?;

        let records = parser::parse_usage_dump(&dump, self.time_provider.time());
        info!("Retrieved {} usage records from {device}", records.len());

        Ok(CollectionOutcome { device, records })
    }
}
