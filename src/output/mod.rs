//! Output module for exports and run summaries
//!
//! This module handles:
//! - Exporting cached datasets as CSV
//! - Loading and printing scrape statistics

mod export;
pub mod stats;

pub use export::export_datasets;
pub use stats::{load_statistics, print_statistics, ScrapeStatistics};
