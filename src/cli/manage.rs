use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::info;

use crate::{
    storage::{
        export::records_to_csv,
        snapshot_storage::{SnapshotStorage, SnapshotStorageImpl},
    },
    utils::clock::DefaultClock,
};

use super::output::NO_DATA_MESSAGE;

/// Command to process `export` command. Writes every stored record into `output` as CSV.
pub async fn process_export_command(output: PathBuf, snapshot_path: PathBuf) -> Result<()> {
    let storage = SnapshotStorageImpl::new(snapshot_path, Box::new(DefaultClock))?;
    let records = storage.load().await?.map(|v| v.records).unwrap_or_default();

    let Some(csv) = records_to_csv(&records) else {
        println!("{NO_DATA_MESSAGE}");
        return Ok(());
    };

    tokio::fs::write(&output, csv)
        .await
        .with_context(|| format!("Failed to write export into {}", output.display()))?;
    info!("Exported {} records into {:?}", records.len(), output);
    println!("Exported {} records to {}", records.len(), output.display());
    Ok(())
}

/// Command to process `clear` command. The mirror, when given, is emptied too.
pub async fn process_clear_command(
    yes: bool,
    mirror: Option<PathBuf>,
    snapshot_path: PathBuf,
) -> Result<()> {
    if !yes {
        println!("This removes every stored record. Run again with --yes to confirm");
        return Ok(());
    }

    let storage =
        SnapshotStorageImpl::new(snapshot_path, Box::new(DefaultClock))?.with_mirror(mirror);
    storage.clear().await?;
    println!("Stored records removed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::{process_clear_command, process_export_command};
    use crate::{
        storage::{
            entities::{UsageRecord, UsageSnapshot},
            snapshot_storage::{SnapshotStorage, SnapshotStorageImpl},
        },
        utils::clock::DefaultClock,
    };

    #[tokio::test]
    async fn exports_and_clears() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let snapshot_path = dir.path().join("usage_data.json");
        let output = dir.path().join("export.csv");

        let storage = SnapshotStorageImpl::new(snapshot_path.clone(), Box::new(DefaultClock))?;
        storage
            .append(vec![UsageRecord::new("com.a", 10, "2024-01-01T00:00:00Z")])
            .await?;

        process_export_command(output.clone(), snapshot_path.clone()).await?;
        let csv = std::fs::read_to_string(&output)?;
        assert!(csv.starts_with("package,time_used_ms,timestamp,app_name\n"));
        assert!(csv.contains("com.a,10,2024-01-01T00:00:00Z,"));

        process_clear_command(false, None, snapshot_path.clone()).await?;
        assert_eq!(storage.load().await?.map(|v| v.records.len()), Some(1));

        process_clear_command(true, None, snapshot_path).await?;
        assert_eq!(storage.load().await?.map(|v| v.records.len()), Some(0));
        Ok(())
    }

    #[tokio::test]
    async fn clear_empties_mirror() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let snapshot_path = dir.path().join("usage_data.json");
        let mirror = dir.path().join("public").join("data").join("usage_data.json");

        let storage = SnapshotStorageImpl::new(snapshot_path.clone(), Box::new(DefaultClock))?
            .with_mirror(Some(mirror.clone()));
        storage
            .append(vec![UsageRecord::new("com.a", 10, "2024-01-01T00:00:00Z")])
            .await?;
        assert!(std::fs::read_to_string(&mirror)?.contains("com.a"));

        process_clear_command(true, Some(mirror.clone()), snapshot_path).await?;

        let mirrored: UsageSnapshot = serde_json::from_str(&std::fs::read_to_string(&mirror)?)?;
        assert_eq!(mirrored, UsageSnapshot::default());
        Ok(())
    }

    #[tokio::test]
    async fn nothing_to_export() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let output = dir.path().join("export.csv");

        process_export_command(output.clone(), dir.path().join("usage_data.json")).await?;

        assert!(!output.exists());
        Ok(())
    }
}
