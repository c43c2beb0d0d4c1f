//! CSV export of cached datasets
//!
//! One file per dataset name. Columns are the union of every record's fields
//! in sorted order; a record missing a field gets an empty cell.

use crate::query::Record;
use crate::storage::Storage;
use crate::ScrapeError;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

/// Writes the deduplicated datasets of `stage` into `dir`
///
/// Returns the paths written, one per dataset name.
pub fn export_datasets(
    storage: &dyn Storage,
    stage: &str,
    dir: &Path,
) -> Result<Vec<PathBuf>, ScrapeError> {
    let mut tables: BTreeMap<String, Vec<Record>> = BTreeMap::new();
    for (_, dataset) in storage.load_datasets(stage)? {
        for (name, records) in dataset.tables() {
            tables
                .entry(name.to_string())
                .or_default()
                .extend(records.iter().cloned());
        }
    }

    if tables.is_empty() {
        tracing::info!("Nothing cached for {}, skipping export", stage);
        return Ok(Vec::new());
    }

    std::fs::create_dir_all(dir)?;

    let mut written = Vec::with_capacity(tables.len());
    for (name, records) in &tables {
        let path = dir.join(format!("{}.csv", name));
        write_table(&path, records)?;
        tracing::info!("Exported {} {} records to {}", records.len(), name, path.display());
        written.push(path);
    }

    Ok(written)
}

fn write_table(path: &Path, records: &[Record]) -> Result<(), ScrapeError> {
    let columns: BTreeSet<&str> = records
        .iter()
        .flat_map(|record| record.keys().map(String::as_str))
        .collect();

    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(&columns)?;
    for record in records {
        writer.write_record(
            columns
                .iter()
                .map(|column| record.get(*column).map(String::as_str).unwrap_or("")),
        )?;
    }
    writer.flush()?;
    Ok(())
}
