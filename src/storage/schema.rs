//! Database schema definitions
//!
//! This module contains all SQL schema definitions for the schoolscrape cache.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- Track scrape runs
CREATE TABLE IF NOT EXISTS runs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    started_at TEXT NOT NULL,
    finished_at TEXT,
    config_hash TEXT NOT NULL,
    stage TEXT NOT NULL,
    status TEXT NOT NULL
);

-- One row per dataset yielded by a dequeue cycle; never updated
CREATE TABLE IF NOT EXISTS writes (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    run_id INTEGER NOT NULL REFERENCES runs(id),
    cycle INTEGER NOT NULL,
    stage TEXT NOT NULL,
    query_key TEXT NOT NULL,
    query_json TEXT NOT NULL,
    written_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_writes_query ON writes(stage, query_key);

-- Records belonging to a write
CREATE TABLE IF NOT EXISTS records (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    write_id INTEGER NOT NULL REFERENCES writes(id),
    dataset TEXT NOT NULL,
    fields_json TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_records_write ON records(write_id);

-- Latest lifecycle state per query
CREATE TABLE IF NOT EXISTS query_states (
    stage TEXT NOT NULL,
    query_key TEXT NOT NULL,
    query_json TEXT NOT NULL,
    state TEXT NOT NULL,
    attempts INTEGER NOT NULL DEFAULT 0,
    run_id INTEGER NOT NULL REFERENCES runs(id),
    updated_at TEXT NOT NULL,
    PRIMARY KEY (stage, query_key)
);

CREATE INDEX IF NOT EXISTS idx_query_states_state ON query_states(stage, state);
"#;

/// Initializes the database schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
