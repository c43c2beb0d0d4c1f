//! HTML extraction helpers shared by the site pages
//!
//! - [`Field`]: one CSS selector, a read mode and an optional value parser
//! - [`Fields`]: an ordered registry of fields read into a record
//! - [`Conditions`]: selectors that signal captcha, refusal or "no results"

mod conditions;
mod field;

pub use conditions::{Condition, Conditions};
pub use field::{Field, Fields, Read, ValueParser};

use crate::ScrapeError;
use scraper::Selector;

/// Compiles a CSS selector, mapping the parse error into a crate error
pub fn selector(css: &str) -> Result<Selector, ScrapeError> {
    Selector::parse(css).map_err(|e| ScrapeError::Selector(format!("{}: {:?}", css, e)))
}

/// Collapses whitespace runs in element text
pub fn normalize_text<'a>(parts: impl Iterator<Item = &'a str>) -> String {
    parts
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}
