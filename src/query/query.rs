use crate::ScrapeError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use url::form_urlencoded;

/// An immutable scrape target
///
/// Fields are kept sorted by name so that the canonical [`Query::key`] is
/// stable across retries, runs and processes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Query {
    fields: BTreeMap<String, String>,
}

impl Query {
    /// Creates a query from name/value pairs
    ///
    /// # Example
    ///
    /// ```
    /// use schoolscrape::Query;
    ///
    /// let query = Query::new([("dataset", "school"), ("zipcode", "93301")]);
    /// assert_eq!(query.key(), "dataset=school&zipcode=93301");
    /// ```
    pub fn new<I, K, V>(fields: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            fields: fields
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Creates a single-field query, e.g. `GID`
    pub fn single(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new([(name.into(), value.into())])
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    /// Gets a field the caller cannot proceed without
    pub fn require(&self, name: &str) -> Result<&str, ScrapeError> {
        self.get(name).ok_or_else(|| ScrapeError::QueryUrl {
            query: self.key(),
            reason: format!("missing field '{}'", name),
        })
    }

    pub fn fields(&self) -> &BTreeMap<String, String> {
        &self.fields
    }

    /// Canonical cache key: form-encoded fields in name order
    pub fn key(&self) -> String {
        form_urlencoded::Serializer::new(String::new())
            .extend_pairs(self.fields.iter())
            .finish()
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key())
    }
}
