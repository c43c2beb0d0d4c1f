//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the Storage trait.

use crate::downloader::{QueueEntry, Yielded};
use crate::query::{Dataset, Query, Record};
use crate::state::QueryState;
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{Storage, StorageError, StorageResult};
use crate::storage::{RunRecord, RunStatus};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Opens or creates the cache database at `path`
    pub fn new(path: &Path) -> StorageResult<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database (for testing)
    #[cfg(test)]
    pub fn new_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }

    fn records(&self, write_id: i64) -> StorageResult<Vec<(String, Record)>> {
        let mut stmt = self
            .conn
            .prepare("SELECT dataset, fields_json FROM records WHERE write_id = ?1 ORDER BY id")?;

        let rows = stmt
            .query_map(params![write_id], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(dataset, json)| Ok((dataset, serde_json::from_str(&json)?)))
            .collect()
    }
}

fn run_from_row(row: &Row<'_>) -> rusqlite::Result<RunRecord> {
    Ok(RunRecord {
        id: row.get(0)?,
        started_at: row.get(1)?,
        finished_at: row.get(2)?,
        config_hash: row.get(3)?,
        stage: row.get(4)?,
        status: RunStatus::from_db_string(&row.get::<_, String>(5)?).unwrap_or(RunStatus::Failed),
    })
}

/// Writes of the latest cycle for one query
struct Latest {
    query_json: String,
    run_id: i64,
    cycle: i64,
    writes: Vec<i64>,
}

impl Storage for SqliteStorage {
    // ===== Run Management =====

    fn create_run(&mut self, stage: &str, config_hash: &str) -> StorageResult<i64> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO runs (started_at, config_hash, stage, status) VALUES (?1, ?2, ?3, ?4)",
            params![now, config_hash, stage, RunStatus::Running.to_db_string()],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord> {
        self.conn
            .query_row(
                "SELECT id, started_at, finished_at, config_hash, stage, status FROM runs WHERE id = ?1",
                params![run_id],
                run_from_row,
            )
            .optional()?
            .ok_or(StorageError::RunNotFound(run_id))
    }

    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>> {
        let run = self
            .conn
            .query_row(
                "SELECT id, started_at, finished_at, config_hash, stage, status FROM runs
                 ORDER BY id DESC LIMIT 1",
                [],
                run_from_row,
            )
            .optional()?;

        Ok(run)
    }

    fn finish_run(&mut self, run_id: i64, status: RunStatus) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        let updated = self.conn.execute(
            "UPDATE runs SET finished_at = ?1, status = ?2 WHERE id = ?3",
            params![now, status.to_db_string(), run_id],
        )?;

        if updated == 0 {
            return Err(StorageError::RunNotFound(run_id));
        }
        Ok(())
    }

    // ===== Datasets =====

    fn write_dataset(&mut self, run_id: i64, stage: &str, yielded: &Yielded) -> StorageResult<i64> {
        let now = Utc::now().to_rfc3339();
        let query_json = serde_json::to_string(&yielded.query)?;

        let tx = self.conn.transaction()?;
        tx.execute(
            "INSERT INTO writes (run_id, cycle, stage, query_key, query_json, written_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                run_id,
                yielded.cycle as i64,
                stage,
                yielded.query.key(),
                query_json,
                now
            ],
        )?;
        let write_id = tx.last_insert_rowid();

        {
            let mut stmt = tx.prepare(
                "INSERT INTO records (write_id, dataset, fields_json) VALUES (?1, ?2, ?3)",
            )?;
            for (name, records) in yielded.dataset.tables() {
                for record in records {
                    stmt.execute(params![write_id, name, serde_json::to_string(record)?])?;
                }
            }
        }

        tx.commit()?;
        Ok(write_id)
    }

    fn load_datasets(&self, stage: &str) -> StorageResult<Vec<(Query, Dataset)>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, run_id, cycle, query_key, query_json FROM writes WHERE stage = ?1 ORDER BY id",
        )?;

        let writes = stmt
            .query_map(params![stage], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, i64>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        // Write ids grow with (run, cycle), so the last cycle seen for a key wins
        let mut order: Vec<String> = Vec::new();
        let mut latest: HashMap<String, Latest> = HashMap::new();
        for (id, run_id, cycle, key, query_json) in writes {
            match latest.get_mut(&key) {
                Some(entry) if entry.run_id == run_id && entry.cycle == cycle => {
                    entry.writes.push(id);
                }
                Some(entry) => {
                    *entry = Latest {
                        query_json,
                        run_id,
                        cycle,
                        writes: vec![id],
                    };
                }
                None => {
                    order.push(key.clone());
                    latest.insert(
                        key,
                        Latest {
                            query_json,
                            run_id,
                            cycle,
                            writes: vec![id],
                        },
                    );
                }
            }
        }

        let mut datasets = Vec::with_capacity(order.len());
        for key in order {
            let Some(entry) = latest.remove(&key) else {
                continue;
            };

            let query: Query = serde_json::from_str(&entry.query_json)?;
            let mut dataset = Dataset::empty();
            for write_id in entry.writes {
                for (name, record) in self.records(write_id)? {
                    dataset.insert(&query, &name, record);
                }
            }
            datasets.push((query, dataset));
        }

        Ok(datasets)
    }

    fn count_records(&self, stage: &str) -> StorageResult<BTreeMap<String, u64>> {
        let mut counts = BTreeMap::new();
        for (_, dataset) in self.load_datasets(stage)? {
            for (name, records) in dataset.tables() {
                *counts.entry(name.to_string()).or_insert(0) += records.len() as u64;
            }
        }
        Ok(counts)
    }

    // ===== Query States =====

    fn save_query_states(
        &mut self,
        run_id: i64,
        stage: &str,
        entries: &[QueueEntry],
    ) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        let tx = self.conn.transaction()?;

        {
            let mut stmt = tx.prepare(
                "INSERT INTO query_states (stage, query_key, query_json, state, attempts, run_id, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                 ON CONFLICT(stage, query_key) DO UPDATE SET
                    query_json = excluded.query_json,
                    state = excluded.state,
                    attempts = excluded.attempts,
                    run_id = excluded.run_id,
                    updated_at = excluded.updated_at",
            )?;

            for entry in entries {
                stmt.execute(params![
                    stage,
                    entry.query.key(),
                    serde_json::to_string(&entry.query)?,
                    entry.state.to_db_string(),
                    entry.attempts,
                    run_id,
                    now
                ])?;
            }
        }

        tx.commit()?;
        Ok(())
    }

    fn fresh_keys(&self, stage: &str, since: DateTime<Utc>) -> StorageResult<HashSet<String>> {
        let mut stmt = self.conn.prepare(
            "SELECT query_key FROM query_states WHERE stage = ?1 AND state = ?2 AND updated_at >= ?3",
        )?;

        let keys = stmt
            .query_map(
                params![
                    stage,
                    QueryState::Success.to_db_string(),
                    since.to_rfc3339()
                ],
                |row| row.get(0),
            )?
            .collect::<Result<HashSet<String>, _>>()?;

        Ok(keys)
    }

    fn count_query_states(&self, stage: &str) -> StorageResult<HashMap<QueryState, u64>> {
        let mut stmt = self
            .conn
            .prepare("SELECT state, COUNT(*) FROM query_states WHERE stage = ?1 GROUP BY state")?;

        let rows = stmt
            .query_map(params![stage], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut counts = HashMap::new();
        for (state, count) in rows {
            let state = QueryState::from_db_string(&state).ok_or(StorageError::Corrupt {
                column: "query_states.state",
                value: state.clone(),
            })?;
            counts.insert(state, count as u64);
        }
        Ok(counts)
    }
}
