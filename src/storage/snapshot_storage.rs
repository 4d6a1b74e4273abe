use std::{
    future::Future,
    io::ErrorKind,
    ops::Deref,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use fs4::tokio::AsyncFileExt;
use tokio::{fs::File, io::AsyncWriteExt};
use tracing::{debug, info, warn};

use crate::utils::{clock::Clock, time::to_record_timestamp};

use super::entities::{UsageRecord, UsageSnapshot};

/// Interface for abstracting storage of the usage snapshot.
pub trait SnapshotStorage {
    /// Reads the whole snapshot into memory. `None` means nothing was collected yet.
    fn load(&self) -> impl Future<Output = Result<Option<UsageSnapshot>>>;

    /// Adds `records` after the already stored ones and marks the snapshot as updated now.
    fn append(&self, records: Vec<UsageRecord>) -> impl Future<Output = Result<UsageSnapshot>>;

    /// Replaces the snapshot with an empty one.
    fn clear(&self) -> impl Future<Output = Result<()>>;
}

impl<T: Deref> SnapshotStorage for T
where
    T::Target: SnapshotStorage,
{
    fn load(&self) -> impl Future<Output = Result<Option<UsageSnapshot>>> {
        self.deref().load()
    }

    fn append(&self, records: Vec<UsageRecord>) -> impl Future<Output = Result<UsageSnapshot>> {
        self.deref().append(records)
    }

    fn clear(&self) -> impl Future<Output = Result<()>> {
        self.deref().clear()
    }
}

/// The main realization of [SnapshotStorage]. Keeps the snapshot in a single pretty printed JSON
/// file and optionally copies every write into a mirror location, which is where the dashboard
/// picks it up from.
///
/// Readers and writers coordinate through a sibling `.lock` file. The snapshot itself is replaced
/// by renaming a fully written staging file over it, so it is never seen half written.
pub struct SnapshotStorageImpl {
    path: PathBuf,
    lock_path: PathBuf,
    mirror: Option<PathBuf>,
    clock: Box<dyn Clock>,
}

impl SnapshotStorageImpl {
    pub fn new(path: PathBuf, clock: Box<dyn Clock>) -> Result<Self, std::io::Error> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        Ok(Self {
            lock_path: sibling_path(&path, ".lock"),
            path,
            mirror: None,
            clock,
        })
    }

    pub fn with_mirror(self, mirror: Option<PathBuf>) -> Self {
        Self { mirror, ..self }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn open_lock(&self) -> Result<File> {
        File::options()
            .write(true)
            .create(true)
            .read(true)
            .truncate(false)
            .open(&self.lock_path)
            .await
            .with_context(|| format!("Failed to open {:?}", self.lock_path))
    }

    /// Runs `update` against the stored snapshot while holding an exclusive lock, then writes the
    /// result back.
    async fn rewrite(
        &self,
        update: impl FnOnce(UsageSnapshot) -> UsageSnapshot,
    ) -> Result<UsageSnapshot> {
        let lock = self.open_lock().await?;

        // Semi-safe acquire-release for a file
        lock.lock_exclusive()?;
        let result = self.rewrite_locked(update).await;
        lock.unlock_async().await?;
        let (snapshot, buffer) = result?;

        self.write_mirror(&buffer).await;
        Ok(snapshot)
    }

    async fn rewrite_locked(
        &self,
        update: impl FnOnce(UsageSnapshot) -> UsageSnapshot,
    ) -> Result<(UsageSnapshot, Vec<u8>)> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(v) => v,
            Err(e) if e.kind() == ErrorKind::NotFound => String::new(),
            Err(e) => return Err(e).with_context(|| format!("Failed to read {:?}", self.path)),
        };
        let snapshot = update(decode_snapshot(&content, &self.path));

        let buffer = encode_snapshot(&snapshot)?;
        replace_file(&self.path, &buffer).await?;
        Ok((snapshot, buffer))
    }

    /// The mirror is a convenience copy, failing to write it is never fatal.
    async fn write_mirror(&self, buffer: &[u8]) {
        let Some(mirror) = self.mirror.as_ref() else {
            return;
        };
        let result = async {
            if let Some(parent) = mirror.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            tokio::fs::write(mirror, buffer).await
        }
        .await;

        match result {
            Ok(()) => debug!("Mirrored snapshot into {mirror:?}"),
            Err(e) => warn!("Could not write snapshot mirror {mirror:?}: {e}"),
        }
    }
}

impl SnapshotStorage for SnapshotStorageImpl {
    async fn load(&self) -> Result<Option<UsageSnapshot>> {
        debug!("Extracting {:?}", self.path);
        let lock = self.open_lock().await?;
        lock.lock_shared()?;
        let read = tokio::fs::read_to_string(&self.path).await;
        lock.unlock_async().await?;

        match read {
            Ok(content) => Ok(Some(decode_snapshot(&content, &self.path))),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("Failed to read {:?}", self.path)),
        }
    }

    async fn append(&self, records: Vec<UsageRecord>) -> Result<UsageSnapshot> {
        let added = records.len();
        let updated_at = to_record_timestamp(self.clock.time());
        let snapshot = self
            .rewrite(move |mut snapshot| {
                snapshot.records.extend(records);
                snapshot.last_updated = Some(updated_at);
                snapshot
            })
            .await?;
        info!(
            "Appended {added} records, {} stored in total",
            snapshot.records.len()
        );
        Ok(snapshot)
    }

    async fn clear(&self) -> Result<()> {
        self.rewrite(|_| UsageSnapshot::default()).await?;
        info!("Cleared snapshot {:?}", self.path);
        Ok(())
    }
}

/// A file that can't be read as a snapshot is treated as an empty one. Might happen after
/// somebody edits it by hand.
fn decode_snapshot(content: &str, path: &Path) -> UsageSnapshot {
    if content.trim().is_empty() {
        return UsageSnapshot::default();
    }
    match serde_json::from_str::<UsageSnapshot>(content) {
        Ok(v) => v,
        Err(e) => {
            warn!("Snapshot {path:?} is not valid, treating it as empty: {e}");
            UsageSnapshot::default()
        }
    }
}

/// `path` with `suffix` added to its file name.
fn sibling_path(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|v| v.to_os_string())
        .unwrap_or_default();
    name.push(suffix);
    path.with_file_name(name)
}

/// Writes `buffer` into a staging file next to `path` and renames it over `path`. On failure the
/// previous content of `path` is untouched.
async fn replace_file(path: &Path, buffer: &[u8]) -> Result<()> {
    let staging = sibling_path(path, ".tmp");
    let result = async {
        let mut file = File::create(&staging).await?;
        file.write_all(buffer).await?;
        file.sync_all().await?;
        drop(file);
        tokio::fs::rename(&staging, path).await
    }
    .await;

    if let Err(e) = result {
        let _ = tokio::fs::remove_file(&staging).await;
        return Err(e).with_context(|| format!("Failed to write {path:?}"));
    }
    Ok(())
}

fn encode_snapshot(snapshot: &UsageSnapshot) -> Result<Vec<u8>> {
    let mut buffer = serde_json::to_vec_pretty(snapshot)?;
    buffer.push(b'\n');
    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use anyhow::Result;
    use chrono::{TimeZone, Utc};
    use tempfile::tempdir;

    use crate::{
        storage::{
            entities::{UsageRecord, UsageSnapshot},
            snapshot_storage::{SnapshotStorage, SnapshotStorageImpl},
        },
        utils::{clock::FixedClock, logging::TEST_LOGGING},
    };

    fn test_clock() -> Box<FixedClock> {
        Box::new(FixedClock(
            Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap(),
        ))
    }

    fn test_records() -> Vec<UsageRecord> {
        vec![
            UsageRecord::new("com.example.a", 1000, "2024-01-01T00:00:00Z"),
            UsageRecord::new("com.example.b", 2000, "2024-01-01T00:00:00Z"),
        ]
    }

    #[tokio::test]
    async fn missing_file_loads_as_none() -> Result<()> {
        let dir = tempdir()?;
        let storage = SnapshotStorageImpl::new(dir.path().join("usage_data.json"), test_clock())?;

        assert_eq!(storage.load().await?, None);
        Ok(())
    }

    #[tokio::test]
    async fn append_merges_with_existing_records() -> Result<()> {
        *TEST_LOGGING;
        let dir = tempdir()?;
        let storage = SnapshotStorageImpl::new(dir.path().join("usage_data.json"), test_clock())?;

        storage.append(test_records()).await?;
        let extra = UsageRecord::new("com.example.a", 500, "2024-01-02T00:00:00Z");
        let returned = storage.append(vec![extra.clone()]).await?;

        let loaded = storage.load().await?.unwrap();
        assert_eq!(loaded, returned);

        let mut expected = test_records();
        expected.push(extra);
        assert_eq!(loaded.records, expected);
        assert_eq!(loaded.last_updated.as_deref(), Some("2024-01-01T12:00:00Z"));
        Ok(())
    }

    #[tokio::test]
    async fn shorter_rewrite_leaves_no_trailing_bytes() -> Result<()> {
        let dir = tempdir()?;
        let storage = SnapshotStorageImpl::new(dir.path().join("usage_data.json"), test_clock())?;

        storage.append(test_records()).await?;
        storage.clear().await?;

        let raw = std::fs::read_to_string(storage.path())?;
        let parsed: UsageSnapshot = serde_json::from_str(&raw)?;
        assert_eq!(parsed, UsageSnapshot::default());
        assert!(raw.contains("\"last_updated\": null"));
        Ok(())
    }

    #[tokio::test]
    async fn corrupted_file_is_treated_as_empty() -> Result<()> {
        *TEST_LOGGING;
        let dir = tempdir()?;
        let path = dir.path().join("usage_data.json");
        std::fs::write(&path, "{ not json")?;
        let storage = SnapshotStorageImpl::new(path, test_clock())?;

        assert_eq!(storage.load().await?, Some(UsageSnapshot::default()));

        let snapshot = storage.append(test_records()).await?;
        assert_eq!(snapshot.records, test_records());
        Ok(())
    }

    #[tokio::test]
    async fn append_keeps_records_with_odd_fields() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("usage_data.json");
        std::fs::write(
            &path,
            r#"{"records": [
                {"package": "com.a", "time_used_ms": 1000, "timestamp": null},
                {"package": "com.b", "time_used_ms": 500, "timestamp": "2024-01-01T00:00:00Z", "app_name": 7}
            ], "last_updated": null}"#,
        )?;
        let storage = SnapshotStorageImpl::new(path, test_clock())?;

        let snapshot = storage.append(test_records()).await?;

        assert_eq!(snapshot.records.len(), 4);
        let raw = std::fs::read_to_string(storage.path())?;
        assert!(raw.contains("com.a"));
        assert!(raw.contains("com.b"));
        let loaded = storage.load().await?.unwrap();
        assert_eq!(
            loaded.records.iter().map(|v| v.time_used_ms).sum::<u64>(),
            4500
        );
        Ok(())
    }

    #[tokio::test]
    async fn failed_write_keeps_previous_snapshot() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("usage_data.json");
        let storage = SnapshotStorageImpl::new(path.clone(), test_clock())?;
        storage.append(test_records()).await?;
        let before = std::fs::read_to_string(&path)?;

        // staging file can't be created when a directory is in its place
        std::fs::create_dir(dir.path().join("usage_data.json.tmp"))?;
        assert!(storage.clear().await.is_err());

        assert_eq!(std::fs::read_to_string(&path)?, before);
        assert_eq!(storage.load().await?.unwrap().records, test_records());
        Ok(())
    }

    #[tokio::test]
    async fn no_staging_file_is_left_behind() -> Result<()> {
        let dir = tempdir()?;
        let storage = SnapshotStorageImpl::new(dir.path().join("usage_data.json"), test_clock())?;

        storage.append(test_records()).await?;

        assert!(!dir.path().join("usage_data.json.tmp").exists());
        Ok(())
    }

    #[tokio::test]
    async fn writes_are_mirrored() -> Result<()> {
        let dir = tempdir()?;
        let mirror = dir.path().join("public").join("data").join("usage_data.json");
        let storage = SnapshotStorageImpl::new(dir.path().join("usage_data.json"), test_clock())?
            .with_mirror(Some(mirror.clone()));

        storage.append(test_records()).await?;

        assert_eq!(
            std::fs::read_to_string(&mirror)?,
            std::fs::read_to_string(storage.path())?
        );
        Ok(())
    }

    #[tokio::test]
    async fn unwritable_mirror_is_not_an_error() -> Result<()> {
        let dir = tempdir()?;
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "file, not a directory")?;
        let storage = SnapshotStorageImpl::new(dir.path().join("usage_data.json"), test_clock())?
            .with_mirror(Some(blocker.join("usage_data.json")));

        let snapshot = storage.append(test_records()).await?;

        assert_eq!(snapshot.records.len(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn storage_works_through_references() -> Result<()> {
        let dir = tempdir()?;
        let storage = std::sync::Arc::new(SnapshotStorageImpl::new(
            dir.path().join("usage_data.json"),
            test_clock(),
        )?);

        storage.append(test_records()).await?;

        assert_eq!(storage.load().await?.unwrap().records.len(), 2);
        Ok(())
    }
}
