//! Storage module for persisting servers and wipe schedules
//!
//! This module handles all database operations, including:
//! - SQLite database initialization and schema management
//! - Server and wipe schedule persistence behind the `Store` trait
//! - Run report persistence
//! - The one-time backfill of schedules from legacy wipe instants

mod migrate;
mod schema;
mod sqlite;
mod traits;

pub use migrate::{backfill_legacy_schedules, MigrationReport};
pub use sqlite::SqliteStore;
pub use traits::{StorageError, StorageResult, Store};

use crate::state::StopReason;
use std::path::Path;

/// Opens (creating if needed) a store database
pub fn open_store(path: &Path) -> StorageResult<SqliteStore> {
    SqliteStore::new(path)
}

/// A persisted source run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunRecord {
    pub id: i64,
    pub source: String,
    pub started_at: String,
    pub finished_at: String,
    pub config_hash: String,
    pub pages_processed: u32,
    pub created: u32,
    pub schedule_added: u32,
    pub skipped_duplicate: u32,
    pub updated: u32,
    pub failures: u32,
    pub discarded: u32,
    pub malformed: u32,
    pub stop_reason: Option<StopReason>,
}
