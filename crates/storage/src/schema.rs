use rusqlite::Connection;

use crate::error::StorageError;

pub const SCHEMA_VERSION: i32 = 1;

pub fn init_schema(conn: &Connection) -> Result<(), StorageError> {
    conn.execute_batch(
        "
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        PRAGMA busy_timeout = 5000;
    ",
    )?;
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}

const SCHEMA_SQL: &str = "
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER PRIMARY KEY,
    applied_at INTEGER NOT NULL
);
INSERT OR IGNORE INTO schema_version (version, applied_at) VALUES (1, unixepoch());

CREATE TABLE IF NOT EXISTS mutations (
    rowid INTEGER PRIMARY KEY,
    mutation_id BLOB NOT NULL UNIQUE CHECK (length(mutation_id) = 16),
    checklist_id TEXT NOT NULL,
    parameter_id TEXT NOT NULL,
    field_name TEXT NOT NULL,
    hlc BLOB NOT NULL CHECK (length(hlc) = 12),
    payload BLOB NOT NULL,
    status TEXT NOT NULL DEFAULT 'pending',
    attempts INTEGER NOT NULL DEFAULT 0,
    next_attempt_at INTEGER NOT NULL DEFAULT 0,
    last_error TEXT,
    created_at INTEGER NOT NULL DEFAULT (CAST(unixepoch('now','subsec') * 1000 AS INTEGER))
);
CREATE INDEX IF NOT EXISTS idx_mutations_field ON mutations (checklist_id, parameter_id, field_name, hlc);
CREATE INDEX IF NOT EXISTS idx_mutations_due ON mutations (status, next_attempt_at);

CREATE TABLE IF NOT EXISTS checklist_snapshots (
    checklist_id TEXT PRIMARY KEY,
    body TEXT NOT NULL,
    fetched_at INTEGER NOT NULL
);
";
