use crate::query::Query;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A single extracted row
pub type Record = BTreeMap<String, String>;

/// Named tables of records extracted for one query
///
/// Every record inserted through [`Dataset::insert`] carries the query's key
/// fields, so a dataset can always be joined back to the query it came from.
/// An empty dataset means the page yielded nothing; it is not an error.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    tables: BTreeMap<String, Vec<Record>>,
}

impl Dataset {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Appends `record` to table `name`, stamping the query's key fields onto it
    pub fn insert(&mut self, query: &Query, name: &str, mut record: Record) {
        for (field, value) in query.fields() {
            record.insert(field.clone(), value.clone());
        }
        self.tables.entry(name.to_string()).or_default().push(record);
    }

    /// Total number of records across all tables
    pub fn len(&self) -> usize {
        self.tables.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn table(&self, name: &str) -> Option<&[Record]> {
        self.tables.get(name).map(Vec::as_slice)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(String::as_str)
    }

    pub fn tables(&self) -> impl Iterator<Item = (&str, &[Record])> {
        self.tables
            .iter()
            .map(|(name, records)| (name.as_str(), records.as_slice()))
    }
}
