//! Value parsers for greatschools page content
//!
//! Each parser takes whitespace-normalized element text and returns the
//! stored value, or None when the text does not carry one.

use crate::scheduler::Address;
use regex::Regex;
use std::sync::LazyLock;

static PERCENT_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+)\s*%$").expect("hardcoded regex pattern is valid"));

static GRAPH_PERCENT_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Created with Highcharts \d\.\d\.\d\s*(\d+)\s*%$")
        .expect("hardcoded regex pattern is valid")
});

static RESULTS_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"of\s+([\d,]+)\s+schools").expect("hardcoded regex pattern is valid")
});

static SCHOOL_TYPE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)public district|public charter|private")
        .expect("hardcoded regex pattern is valid")
});

static SCHOOL_ID_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/(\d+)-").expect("hardcoded regex pattern is valid"));

/// `"7/10"` → `"7"`
pub fn score(raw: &str) -> Option<String> {
    let value = raw.split('/').next()?.trim();
    value.parse::<u32>().ok().map(|v| v.to_string())
}

/// `"54%"` → `"54"`
pub fn percent(raw: &str) -> Option<String> {
    PERCENT_REGEX
        .captures(raw.trim())
        .map(|c| c[1].to_string())
}

/// Percent rendered inside a chart, after the chart library's credit text
pub fn graph_percent(raw: &str) -> Option<String> {
    GRAPH_PERCENT_REGEX
        .captures(raw.trim())
        .map(|c| c[1].to_string())
}

/// `"16 : 1"` → `"16"`, `"33:2"` → `"16.5"`
pub fn ratio(raw: &str) -> Option<String> {
    let compact: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
    let (numerator, denominator) = compact.split_once(':')?;
    let numerator: f64 = numerator.parse().ok()?;
    let denominator: f64 = denominator.parse().ok()?;
    if denominator == 0.0 {
        return None;
    }
    Some((numerator / denominator).to_string())
}

/// `"K-5"` → `"K|5"`
pub fn grades(raw: &str) -> Option<String> {
    Some(raw.trim().replace('-', "|"))
}

/// Extracts one of the known school types
pub fn school_type(raw: &str) -> Option<String> {
    SCHOOL_TYPE_REGEX.find(raw).map(|m| m.as_str().to_string())
}

/// Normalizes an address, keeping the raw text when it does not parse
pub fn address(raw: &str) -> Option<String> {
    Some(
        Address::parse(raw)
            .map(|a| a.to_string())
            .unwrap_or_else(|| raw.trim().to_string()),
    )
}

/// `"Showing 1 to 25 of 1,130 schools"` → `"1130"`
pub fn results(raw: &str) -> Option<String> {
    RESULTS_REGEX
        .captures(raw)
        .map(|c| c[1].replace(',', ""))
}

/// Numeric school identifier embedded in a GID path
pub fn school_id(gid: &str) -> Option<String> {
    SCHOOL_ID_REGEX.captures(gid).map(|c| c[1].to_string())
}
