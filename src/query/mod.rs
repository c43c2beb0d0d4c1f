//! Scrape targets and the data extracted for them
//!
//! - `Query`: immutable field map describing one scrape target; doubles as the cache key
//! - `Dataset`: named tables of records extracted for one query
//! - `Record`: a single field → value row

mod dataset;
mod query;

pub use dataset::{Dataset, Record};
pub use query::Query;
