//! Configuration module for schoolscrape
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use schoolscrape::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("schoolscrape.toml")).unwrap();
//! println!("Attempts per query: {}", config.scraper.attempts);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    Config, DelayConfig, DelayMethod, InputConfig, OutputConfig, ScraperConfig, SessionConfig,
    VpnConfig,
};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};
