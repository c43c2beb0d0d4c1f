//! Scheduler: turns a filter over a reference table into an ordered queue
//!
//! Resolution keeps the reference table's order. The filter applies to every
//! row first; when a key matches more than once the last matching occurrence
//! wins, at the position where it occurred. A missing reference file resolves
//! to nothing.

mod address;
mod filter;
mod reference;

pub use address::Address;
pub use filter::{pad_zipcode, Filter, Place};
pub use reference::{read_links, read_zipcodes, ReferenceRow};

use crate::downloader::Queue;
use crate::query::Query;
use crate::ScrapeError;
use rand::seq::SliceRandom;
use std::collections::HashSet;
use std::path::PathBuf;

/// Reference table a stage is scheduled from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    /// Zipcode table, scheduling `{dataset: school, zipcode}` queries
    Zipcodes(PathBuf),
    /// Link table, scheduling `{GID}` queries
    Links(PathBuf),
    /// Link table, scheduling `{GID, state}` queries; rows without a state are skipped
    Boundaries(PathBuf),
}

impl Source {
    fn path(&self) -> &PathBuf {
        match self {
            Self::Zipcodes(path) | Self::Links(path) | Self::Boundaries(path) => path,
        }
    }

    fn rows(&self) -> Result<Vec<ReferenceRow>, ScrapeError> {
        match self {
            Self::Zipcodes(path) => read_zipcodes(path),
            Self::Links(path) | Self::Boundaries(path) => read_links(path),
        }
    }

    /// Builds the query for a resolved row, if the row carries what the query needs
    pub fn query(&self, row: &ReferenceRow) -> Option<Query> {
        let key = row.key.as_str();
        match self {
            Self::Zipcodes(_) => Some(Query::new([("dataset", "school"), ("zipcode", key)])),
            Self::Links(_) => Some(Query::single("GID", key)),
            Self::Boundaries(_) => {
                let state = row.place.state.as_deref()?;
                Some(Query::new([("GID", key), ("state", state)]))
            }
        }
    }
}

/// Resolves filters into queries and queues
#[derive(Debug, Clone)]
pub struct Scheduler {
    source: Source,
    randomize: bool,
    limit: Option<usize>,
    skip: HashSet<String>,
}

impl Scheduler {
    pub fn new(source: Source) -> Self {
        Self {
            source,
            randomize: false,
            limit: None,
            skip: HashSet::new(),
        }
    }

    /// Shuffles the resolved queries once, before the limit applies
    pub fn randomize(mut self, randomize: bool) -> Self {
        self.randomize = randomize;
        self
    }

    pub fn limit(mut self, limit: Option<usize>) -> Self {
        self.limit = limit;
        self
    }

    /// Query keys that must not be scheduled again
    pub fn skip(mut self, keys: HashSet<String>) -> Self {
        self.skip = keys;
        self
    }

    /// Resolves the filter to plain reference keys, deduplicated, in table order
    pub fn resolve_keys(&self, filter: &Filter) -> Result<Vec<String>, ScrapeError> {
        Ok(self
            .resolve_rows(filter)?
            .into_iter()
            .map(|(row, _)| row.key)
            .collect())
    }

    /// Resolves the filter to queries, in table order
    pub fn resolve(&self, filter: &Filter) -> Result<Vec<Query>, ScrapeError> {
        Ok(self
            .resolve_rows(filter)?
            .into_iter()
            .map(|(_, query)| query)
            .collect())
    }

    fn resolve_rows(&self, filter: &Filter) -> Result<Vec<(ReferenceRow, Query)>, ScrapeError> {
        let path = self.source.path();
        if !path.exists() {
            tracing::warn!("Reference table {} not found, nothing to schedule", path.display());
            return Ok(Vec::new());
        }

        let matching: Vec<ReferenceRow> = self
            .source
            .rows()?
            .into_iter()
            .filter(|row| filter.matches(&row.place))
            .collect();

        Ok(keep_last(matching)
            .into_iter()
            .filter_map(|row| match self.source.query(&row) {
                Some(query) => Some((row, query)),
                None => {
                    tracing::warn!("Skipping {}: no state in its address", row.key);
                    None
                }
            })
            .collect())
    }

    /// Builds the run queue: resolve, drop skipped keys, shuffle, limit
    pub fn queue(&self, filter: &Filter, attempts: u32) -> Result<Queue, ScrapeError> {
        let resolved = self.resolve(filter)?;
        let total = resolved.len();

        let mut queries: Vec<Query> = resolved
            .into_iter()
            .filter(|query| !self.skip.contains(&query.key()))
            .collect();

        if queries.len() < total {
            tracing::info!(
                "Skipping {} recently resolved queries",
                total - queries.len()
            );
        }

        if self.randomize {
            queries.shuffle(&mut rand::thread_rng());
        }

        if let Some(limit) = self.limit {
            queries.truncate(limit);
        }

        tracing::info!("Scheduled {} of {} queries", queries.len(), total);
        Ok(Queue::new(queries, attempts))
    }
}

/// Drops earlier duplicate rows, keeping each key at its last position
fn keep_last(rows: Vec<ReferenceRow>) -> Vec<ReferenceRow> {
    let mut seen = HashSet::new();
    let mut kept: Vec<ReferenceRow> = rows
        .into_iter()
        .rev()
        .filter(|row| seen.insert(row.key.clone()))
        .collect();
    kept.reverse();
    kept
}
