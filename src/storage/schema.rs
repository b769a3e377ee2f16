//! Database schema definitions
//!
//! This module contains all SQL schema definitions for the Wipe-Ledger database.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- Known game servers
CREATE TABLE IF NOT EXISTS servers (
    server_id INTEGER PRIMARY KEY,
    server_name TEXT NOT NULL,
    max_group INTEGER CHECK (max_group IS NULL OR max_group BETWEEN 1 AND 4),
    wipe_time TEXT
);

-- Weekly wipe slots, at most one row per (server, day, hour)
CREATE TABLE IF NOT EXISTS wipe_schedules (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    server_id INTEGER NOT NULL REFERENCES servers(server_id),
    day_name TEXT NOT NULL,
    wipe_hour TEXT NOT NULL,
    created_at TEXT NOT NULL,
    UNIQUE(server_id, day_name, wipe_hour)
);

CREATE INDEX IF NOT EXISTS idx_wipe_schedules_server ON wipe_schedules(server_id);

-- One row per finished source run
CREATE TABLE IF NOT EXISTS ingest_runs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    source TEXT NOT NULL,
    started_at TEXT NOT NULL,
    finished_at TEXT NOT NULL,
    config_hash TEXT NOT NULL,
    pages_processed INTEGER NOT NULL DEFAULT 0,
    created INTEGER NOT NULL DEFAULT 0,
    schedule_added INTEGER NOT NULL DEFAULT 0,
    skipped_duplicate INTEGER NOT NULL DEFAULT 0,
    updated INTEGER NOT NULL DEFAULT 0,
    failures INTEGER NOT NULL DEFAULT 0,
    discarded INTEGER NOT NULL DEFAULT 0,
    malformed INTEGER NOT NULL DEFAULT 0,
    stop_reason TEXT
);

CREATE INDEX IF NOT EXISTS idx_ingest_runs_source ON ingest_runs(source);
"#;

/// Initializes the database schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    #[test]
    fn test_schema_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        initialize_schema(&conn).unwrap();
        assert!(initialize_schema(&conn).is_ok());
    }

    #[test]
    fn test_tables_exist_after_init() {
        let conn = Connection::open_in_memory().unwrap();
        initialize_schema(&conn).unwrap();

        for table in ["servers", "wipe_schedules", "ingest_runs"] {
            let count: i64 = conn
                .query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?1",
                    [table],
                    |row| row.get(0),
                )
                .unwrap();
            assert_eq!(count, 1, "Table {} should exist", table);
        }
    }

    #[test]
    fn test_group_cap_is_checked() {
        let conn = Connection::open_in_memory().unwrap();
        initialize_schema(&conn).unwrap();

        let result = conn.execute(
            "INSERT INTO servers (server_id, server_name, max_group) VALUES (1, 'x', 9)",
            [],
        );
        assert!(result.is_err());
    }
}
