//!  Storage is organized through [snapshot_storage::SnapshotStorageImpl].
//!  The basic idea is:
//!   - There is a single JSON file holding every collected record.
//!   - Each collection run appends its records and bumps `last_updated`.
//!   - Reading is lenient. Broken values turn into defaults instead of errors.

pub mod entities;
pub mod export;
pub mod snapshot_storage;
