//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the Store trait.

use crate::model::{NewScheduleEntry, ServerRecord, WipeScheduleEntry};
use crate::state::StopReason;
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{StorageError, StorageResult, Store};
use crate::storage::RunRecord;
use chrono::{DateTime, Utc};
use rusqlite::{ffi, params, params_from_iter, Connection, ErrorCode, OptionalExtension, Row};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::time::Duration;

/// Largest id list bound into a single `IN (...)` query
const MAX_BOUND_IDS: usize = 500;

/// How long a write waits on another connection's lock before failing
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// SQLite store backend
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Opens or creates the database at `path`
    ///
    /// WAL mode plus a busy timeout let overlapping runs share the file.
    pub fn new(path: &Path) -> StorageResult<Self> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
        ",
        )?;
        conn.busy_timeout(BUSY_TIMEOUT)?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database (for tests and dry runs)
    pub fn new_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }
}

/// Maps SQLite constraint failures to `Duplicate` or `ConstraintViolation`
///
/// Unique and primary-key collisions are told apart from the other
/// constraints by the extended result code.
fn map_write_error(err: rusqlite::Error) -> StorageError {
    match &err {
        rusqlite::Error::SqliteFailure(code, message)
            if code.code == ErrorCode::ConstraintViolation =>
        {
            let message = message.clone().unwrap_or_else(|| code.to_string());
            match code.extended_code {
                ffi::SQLITE_CONSTRAINT_UNIQUE | ffi::SQLITE_CONSTRAINT_PRIMARYKEY => {
                    StorageError::Duplicate(message)
                }
                _ => StorageError::ConstraintViolation(message),
            }
        }
        _ => StorageError::Sqlite(err),
    }
}

fn format_instant(instant: &Option<DateTime<Utc>>) -> Option<String> {
    instant.map(|t| t.to_rfc3339())
}

fn parse_instant(raw: Option<String>) -> StorageResult<Option<DateTime<Utc>>> {
    raw.map(|s| {
        DateTime::parse_from_rfc3339(&s)
            .map(|t| t.with_timezone(&Utc))
            .map_err(|_| StorageError::CorruptValue {
                column: "wipe_time",
                value: s,
            })
    })
    .transpose()
}

/// Raw server row; the wipe instant is decoded outside the rusqlite closure
struct ServerRow {
    server_id: i64,
    server_name: String,
    max_group: Option<u8>,
    wipe_time: Option<String>,
}

impl ServerRow {
    const COLUMNS: &'static str = "server_id, server_name, max_group, wipe_time";

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            server_id: row.get(0)?,
            server_name: row.get(1)?,
            max_group: row.get(2)?,
            wipe_time: row.get(3)?,
        })
    }

    fn into_record(self) -> StorageResult<ServerRecord> {
        Ok(ServerRecord {
            server_id: self.server_id,
            server_name: self.server_name,
            max_group: self.max_group,
            wipe_time: parse_instant(self.wipe_time)?,
        })
    }
}

fn schedule_from_row(row: &Row<'_>) -> rusqlite::Result<WipeScheduleEntry> {
    Ok(WipeScheduleEntry {
        id: row.get(0)?,
        server_id: row.get(1)?,
        day_name: row.get(2)?,
        wipe_hour: row.get(3)?,
    })
}

fn run_from_row(row: &Row<'_>) -> rusqlite::Result<RunRecord> {
    Ok(RunRecord {
        id: row.get(0)?,
        source: row.get(1)?,
        started_at: row.get(2)?,
        finished_at: row.get(3)?,
        config_hash: row.get(4)?,
        pages_processed: row.get(5)?,
        created: row.get(6)?,
        schedule_added: row.get(7)?,
        skipped_duplicate: row.get(8)?,
        updated: row.get(9)?,
        failures: row.get(10)?,
        discarded: row.get(11)?,
        malformed: row.get(12)?,
        stop_reason: row
            .get::<_, Option<String>>(13)?
            .and_then(|s| StopReason::from_db_string(&s)),
    })
}

impl Store for SqliteStore {
    // ===== Servers =====

    fn get(&self, server_id: i64) -> StorageResult<Option<ServerRecord>> {
        let row = self
            .conn
            .query_row(
                &format!("SELECT {} FROM servers WHERE server_id = ?1", ServerRow::COLUMNS),
                params![server_id],
                ServerRow::from_row,
            )
            .optional()?;

        row.map(ServerRow::into_record).transpose()
    }

    fn get_many_ids(&self, ids: &[i64]) -> StorageResult<HashSet<i64>> {
        let mut present = HashSet::new();

        for chunk in ids.chunks(MAX_BOUND_IDS) {
            let placeholders = vec!["?"; chunk.len()].join(", ");
            let mut stmt = self.conn.prepare(&format!(
                "SELECT server_id FROM servers WHERE server_id IN ({})",
                placeholders
            ))?;
            let rows = stmt.query_map(params_from_iter(chunk.iter()), |row| row.get(0))?;
            for id in rows {
                present.insert(id?);
            }
        }

        Ok(present)
    }

    fn get_many(&self, ids: &[i64]) -> StorageResult<HashMap<i64, ServerRecord>> {
        let mut records = HashMap::new();

        for chunk in ids.chunks(MAX_BOUND_IDS) {
            let placeholders = vec!["?"; chunk.len()].join(", ");
            let mut stmt = self.conn.prepare(&format!(
                "SELECT {} FROM servers WHERE server_id IN ({})",
                ServerRow::COLUMNS,
                placeholders
            ))?;
            let rows = stmt.query_map(params_from_iter(chunk.iter()), ServerRow::from_row)?;
            for row in rows {
                let record = row?.into_record()?;
                records.insert(record.server_id, record);
            }
        }

        Ok(records)
    }

    fn create(&mut self, record: &ServerRecord) -> StorageResult<ServerRecord> {
        self.conn
            .execute(
                "INSERT INTO servers (server_id, server_name, max_group, wipe_time)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    record.server_id,
                    record.server_name,
                    record.max_group,
                    format_instant(&record.wipe_time)
                ],
            )
            .map_err(map_write_error)?;

        Ok(record.clone())
    }

    fn update(&mut self, record: &ServerRecord) -> StorageResult<()> {
        let changed = self
            .conn
            .execute(
                "UPDATE servers SET server_name = ?1, max_group = ?2, wipe_time = ?3
                 WHERE server_id = ?4",
                params![
                    record.server_name,
                    record.max_group,
                    format_instant(&record.wipe_time),
                    record.server_id
                ],
            )
            .map_err(map_write_error)?;

        if changed == 0 {
            return Err(StorageError::NotFound(record.server_id));
        }
        Ok(())
    }

    fn servers_with_legacy_wipe_time(&self) -> StorageResult<Vec<ServerRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM servers WHERE wipe_time IS NOT NULL ORDER BY server_id",
            ServerRow::COLUMNS
        ))?;
        let rows = stmt.query_map([], ServerRow::from_row)?;

        let mut records = Vec::new();
        for row in rows {
            records.push(row?.into_record()?);
        }
        Ok(records)
    }

    // ===== Wipe schedules =====

    fn create_schedule_entry(
        &mut self,
        entry: &NewScheduleEntry,
    ) -> StorageResult<WipeScheduleEntry> {
        let now = Utc::now().to_rfc3339();
        self.conn
            .execute(
                "INSERT INTO wipe_schedules (server_id, day_name, wipe_hour, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![entry.server_id, entry.day_name, entry.wipe_hour, now],
            )
            .map_err(map_write_error)?;

        Ok(WipeScheduleEntry {
            id: self.conn.last_insert_rowid(),
            server_id: entry.server_id,
            day_name: entry.day_name.clone(),
            wipe_hour: entry.wipe_hour.clone(),
        })
    }

    fn find_schedule_entry(
        &self,
        server_id: i64,
        day_name: &str,
        wipe_hour: &str,
    ) -> StorageResult<Option<WipeScheduleEntry>> {
        let entry = self
            .conn
            .query_row(
                "SELECT id, server_id, day_name, wipe_hour FROM wipe_schedules
                 WHERE server_id = ?1 AND day_name = ?2 AND wipe_hour = ?3",
                params![server_id, day_name, wipe_hour],
                schedule_from_row,
            )
            .optional()?;
        Ok(entry)
    }

    fn list_schedule(&self, server_id: i64) -> StorageResult<Vec<WipeScheduleEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, server_id, day_name, wipe_hour FROM wipe_schedules
             WHERE server_id = ?1 ORDER BY id",
        )?;
        let entries = stmt
            .query_map(params![server_id], schedule_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    // ===== Run reports =====

    fn record_run(&mut self, run: &RunRecord) -> StorageResult<i64> {
        self.conn
            .execute(
                "INSERT INTO ingest_runs (source, started_at, finished_at, config_hash,
                 pages_processed, created, schedule_added, skipped_duplicate, updated,
                 failures, discarded, malformed, stop_reason)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
                params![
                    run.source,
                    run.started_at,
                    run.finished_at,
                    run.config_hash,
                    run.pages_processed,
                    run.created,
                    run.schedule_added,
                    run.skipped_duplicate,
                    run.updated,
                    run.failures,
                    run.discarded,
                    run.malformed,
                    run.stop_reason.map(|r| r.to_db_string()),
                ],
            )
            .map_err(map_write_error)?;
        Ok(self.conn.last_insert_rowid())
    }

    fn recent_runs(&self, limit: usize) -> StorageResult<Vec<RunRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, source, started_at, finished_at, config_hash, pages_processed,
             created, schedule_added, skipped_duplicate, updated, failures, discarded,
             malformed, stop_reason
             FROM ingest_runs ORDER BY id DESC LIMIT ?1",
        )?;
        let runs = stmt
            .query_map(params![limit as i64], run_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(runs)
    }

    // ===== Statistics =====

    fn count_servers(&self) -> StorageResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM servers", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    fn count_schedule_entries(&self) -> StorageResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM wipe_schedules", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    fn count_unknown_group(&self) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM servers WHERE max_group IS NULL",
            [],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn schedule_day_breakdown(&self) -> StorageResult<HashMap<String, u64>> {
        let mut stmt = self
            .conn
            .prepare("SELECT day_name, COUNT(*) FROM wipe_schedules GROUP BY day_name")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;

        let mut breakdown = HashMap::new();
        for row in rows {
            let (day, count) = row?;
            breakdown.insert(day, count as u64);
        }
        Ok(breakdown)
    }
}
