//! Statistics generation from the scrape cache
//!
//! This module provides functionality for extracting and displaying
//! per-stage statistics from the storage layer.

use crate::state::QueryState;
use crate::storage::{RunRecord, Storage};
use crate::ScrapeError;
use std::collections::{BTreeMap, HashMap};

/// Scrape statistics for one stage
#[derive(Debug, Clone)]
pub struct ScrapeStatistics {
    pub stage: String,

    /// Most recent run of any stage
    pub latest_run: Option<RunRecord>,

    /// Count of queries by latest state
    pub queries_by_state: HashMap<QueryState, u64>,

    /// Cached records per dataset name, latest write per query only
    pub records_by_dataset: BTreeMap<String, u64>,
}

impl ScrapeStatistics {
    pub fn total_queries(&self) -> u64 {
        self.queries_by_state.values().sum()
    }

    pub fn total_records(&self) -> u64 {
        self.records_by_dataset.values().sum()
    }

    /// Share of known queries whose latest state is a success, in percent
    pub fn success_rate(&self) -> f64 {
        let total = self.total_queries();
        if total == 0 {
            return 0.0;
        }
        let success = self
            .queries_by_state
            .get(&QueryState::Success)
            .copied()
            .unwrap_or(0);
        success as f64 / total as f64 * 100.0
    }
}

/// Loads statistics for `stage` from storage
pub fn load_statistics(storage: &dyn Storage, stage: &str) -> Result<ScrapeStatistics, ScrapeError> {
    Ok(ScrapeStatistics {
        stage: stage.to_string(),
        latest_run: storage.get_latest_run()?,
        queries_by_state: storage.count_query_states(stage)?,
        records_by_dataset: storage.count_records(stage)?,
    })
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &ScrapeStatistics) {
    println!("=== {} Statistics ===\n", stats.stage);

    if let Some(run) = &stats.latest_run {
        println!("Latest run:");
        println!("  #{} ({}) {}", run.id, run.stage, run.status);
        println!("  Started: {}", run.started_at);
        if let Some(finished) = &run.finished_at {
            println!("  Finished: {}", finished);
        }
        println!();
    }

    println!("Queries by State:");
    let mut state_counts: Vec<_> = stats.queries_by_state.iter().collect();
    state_counts.sort_by(|a, b| b.1.cmp(a.1));

    let total = stats.total_queries();
    for (state, count) in state_counts {
        let percentage = if total > 0 {
            (*count as f64 / total as f64) * 100.0
        } else {
            0.0
        };
        println!("  {}: {} ({:.1}%)", state, count, percentage);
    }
    println!();

    if !stats.records_by_dataset.is_empty() {
        println!("Cached Records:");
        for (dataset, count) in &stats.records_by_dataset {
            println!("  {}: {}", dataset, count);
        }
        println!();
    }

    println!(
        "Success Rate: {:.1}% ({} queries, {} records)",
        stats.success_rate(),
        total,
        stats.total_records()
    );
}
