//! Storage traits and error types
//!
//! This module defines the trait interface for store backends and
//! associated error types.

use crate::model::{NewScheduleEntry, ServerRecord, WipeScheduleEntry};
use crate::storage::RunRecord;
use std::collections::{HashMap, HashSet};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Server not found: {0}")]
    NotFound(i64),

    /// A row with the same unique key already exists
    #[error("Duplicate row: {0}")]
    Duplicate(String),

    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("Corrupt value in column {column}: {value}")]
    CorruptValue { column: &'static str, value: String },

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for store backend implementations
///
/// Every write is a single-row atomic statement, so callers may retry any
/// call and several runs may share one database file.
pub trait Store {
    // ===== Servers =====

    /// Gets a server by id
    fn get(&self, server_id: i64) -> StorageResult<Option<ServerRecord>>;

    /// Returns the subset of `ids` that exist, in one membership query
    fn get_many_ids(&self, ids: &[i64]) -> StorageResult<HashSet<i64>>;

    /// Loads every server in `ids` that exists
    fn get_many(&self, ids: &[i64]) -> StorageResult<HashMap<i64, ServerRecord>>;

    /// Inserts a new server
    ///
    /// Fails with `Duplicate` if the id is already taken.
    fn create(&mut self, record: &ServerRecord) -> StorageResult<ServerRecord>;

    /// Overwrites name, group cap and wipe time of an existing server
    ///
    /// The id itself is never changed.
    fn update(&mut self, record: &ServerRecord) -> StorageResult<()>;

    /// Servers still carrying a legacy single wipe instant
    fn servers_with_legacy_wipe_time(&self) -> StorageResult<Vec<ServerRecord>>;

    // ===== Wipe schedules =====

    /// Inserts a schedule entry
    ///
    /// Fails with `Duplicate` if the (server, day, hour) triple exists and
    /// with `ConstraintViolation` if the server does not.
    fn create_schedule_entry(&mut self, entry: &NewScheduleEntry)
        -> StorageResult<WipeScheduleEntry>;

    /// Finds the entry with exactly this (server, day, hour) triple
    fn find_schedule_entry(
        &self,
        server_id: i64,
        day_name: &str,
        wipe_hour: &str,
    ) -> StorageResult<Option<WipeScheduleEntry>>;

    /// All schedule entries of one server, oldest first
    fn list_schedule(&self, server_id: i64) -> StorageResult<Vec<WipeScheduleEntry>>;

    // ===== Run reports =====

    /// Persists a finished run; returns its id
    fn record_run(&mut self, run: &RunRecord) -> StorageResult<i64>;

    /// Most recent runs, newest first
    fn recent_runs(&self, limit: usize) -> StorageResult<Vec<RunRecord>>;

    // ===== Statistics =====

    fn count_servers(&self) -> StorageResult<u64>;

    fn count_schedule_entries(&self) -> StorageResult<u64>;

    /// Servers whose group cap is still unknown
    fn count_unknown_group(&self) -> StorageResult<u64>;

    /// Schedule entry counts per weekday name
    fn schedule_day_breakdown(&self) -> StorageResult<HashMap<String, u64>>;
}
