//! CSV reference tables
//!
//! - Zipcode table: `zipcode,type,city,state,county`; only `standard` rows count
//! - Link table: exported `links` dataset with `GID,link,address` columns

use crate::scheduler::address::Address;
use crate::scheduler::filter::{pad_zipcode, Place};
use crate::ScrapeError;
use serde::Deserialize;
use std::path::Path;

/// One selectable row: the key it schedules and where it is
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceRow {
    pub key: String,
    pub place: Place,
}

#[derive(Debug, Deserialize)]
struct ZipcodeRow {
    zipcode: String,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    city: Option<String>,
    #[serde(default)]
    state: Option<String>,
    #[serde(default)]
    county: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LinkRow {
    #[serde(rename = "GID")]
    gid: String,
    #[serde(default)]
    address: Option<String>,
}

/// Reads the zipcode table, keyed by five-digit zipcode
pub fn read_zipcodes(path: &Path) -> Result<Vec<ReferenceRow>, ScrapeError> {
    let mut reader = csv::Reader::from_path(path)?;
    let mut rows = Vec::new();

    for record in reader.deserialize::<ZipcodeRow>() {
        let row = record?;
        if row.kind.trim() != "standard" {
            continue;
        }

        let Some(zipcode) = pad_zipcode(&row.zipcode) else {
            tracing::warn!("Skipping malformed zipcode '{}'", row.zipcode);
            continue;
        };

        rows.push(ReferenceRow {
            key: zipcode.clone(),
            place: Place {
                city: non_empty(row.city),
                state: non_empty(row.state),
                zipcode: Some(zipcode),
                county: non_empty(row.county),
            },
        });
    }

    tracing::debug!("Read {} standard zipcodes from {}", rows.len(), path.display());
    Ok(rows)
}

/// Reads the link table, keyed by GID, locating each row by its address
pub fn read_links(path: &Path) -> Result<Vec<ReferenceRow>, ScrapeError> {
    let mut reader = csv::Reader::from_path(path)?;
    let mut rows = Vec::new();

    for record in reader.deserialize::<LinkRow>() {
        let row = record?;
        let gid = row.gid.trim();
        if gid.is_empty() {
            continue;
        }

        let place = row
            .address
            .as_deref()
            .and_then(Address::parse)
            .map(|address| Place {
                city: Some(address.city),
                state: Some(address.state),
                zipcode: Some(address.zipcode),
                county: None,
            })
            .unwrap_or_default();

        rows.push(ReferenceRow {
            key: gid.to_string(),
            place,
        });
    }

    tracing::debug!("Read {} links from {}", rows.len(), path.display());
    Ok(rows)
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
