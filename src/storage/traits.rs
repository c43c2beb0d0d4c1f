//! Storage traits and error types

use crate::downloader::{QueueEntry, Yielded};
use crate::query::{Dataset, Query};
use crate::state::QueryState;
use crate::storage::{RunRecord, RunStatus};
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap, HashSet};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Run not found: {0}")]
    RunNotFound(i64),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Corrupt value in column {column}: {value}")]
    Corrupt { column: &'static str, value: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for cache backends
///
/// Writes are append-only. Reads deduplicate by query key, keeping the most
/// recent write, including writes that carried an empty dataset.
pub trait Storage {
    // ===== Run Management =====

    /// Creates a new run for `stage`
    fn create_run(&mut self, stage: &str, config_hash: &str) -> StorageResult<i64>;

    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord>;

    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>>;

    /// Sets the final status and finish timestamp of a run
    fn finish_run(&mut self, run_id: i64, status: RunStatus) -> StorageResult<()>;

    // ===== Datasets =====

    /// Appends one yielded dataset, returning the write id
    fn write_dataset(&mut self, run_id: i64, stage: &str, yielded: &Yielded) -> StorageResult<i64>;

    /// Latest dataset per query for `stage`, in first-write order
    fn load_datasets(&self, stage: &str) -> StorageResult<Vec<(Query, Dataset)>>;

    /// Number of records per dataset name, counting latest writes only
    fn count_records(&self, stage: &str) -> StorageResult<BTreeMap<String, u64>>;

    // ===== Query States =====

    /// Records the final state of every queue entry of a run
    fn save_query_states(&mut self, run_id: i64, stage: &str, entries: &[QueueEntry])
        -> StorageResult<()>;

    /// Keys of queries resolved successfully at or after `since`
    fn fresh_keys(&self, stage: &str, since: DateTime<Utc>) -> StorageResult<HashSet<String>>;

    /// Number of queries per latest state
    fn count_query_states(&self, stage: &str) -> StorageResult<HashMap<QueryState, u64>>;
}
