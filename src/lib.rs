//! Collects Android app usage statistics over adb and turns them into reports.
//! Collected records are kept in a single JSON snapshot, which can also be mirrored for a web
//! dashboard to read.
//!

pub mod bridge;
pub mod cli;
pub mod collection;
pub mod storage;
pub mod utils;
