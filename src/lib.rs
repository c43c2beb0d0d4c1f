//! Schoolscrape: a resilient sequential scraper for school information pages
//!
//! This crate turns a filtered list of scrape targets into a rate-limited,
//! strictly sequential series of page loads, recovering from captchas and
//! refusals by rotating the session and the VPN egress identity, and caching
//! extracted datasets incrementally.

pub mod config;
pub mod downloader;
pub mod extract;
pub mod output;
pub mod query;
pub mod scheduler;
pub mod sites;
pub mod state;
pub mod storage;
pub mod vpn;

use thiserror::Error;

/// Main error type for schoolscrape operations
#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("HTTP error for {url}: {source}")]
    Http { url: String, source: reqwest::Error },

    #[error("Request timeout for {url}")]
    Timeout { url: String },

    #[error("Unexpected HTTP status {status} for {url}")]
    Status { url: String, status: u16 },

    #[error("Storage error: {0}")]
    StorageError(#[from] storage::StorageError),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("VPN error: {0}")]
    Vpn(#[from] vpn::VpnError),

    #[error("Session error: {0}")]
    Session(String),

    #[error("Invalid selector: {0}")]
    Selector(String),

    #[error("Cannot build URL for query {query}: {reason}")]
    QueryUrl { query: String, reason: String },

    #[error("Extraction error for {url}: {message}")]
    Extraction { url: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// Result type alias for schoolscrape operations
pub type Result<T> = std::result::Result<T, ScrapeError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use downloader::{Downloader, PageError, Queue, RunReport};
pub use query::{Dataset, Query, Record};
pub use state::{QueryState, VpnState};
