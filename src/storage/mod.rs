//! Metric and tag search index.
//!
//! This module defines the data model for ingested points and the traits the
//! rest of the daemon uses to feed and query the index. The in-memory
//! implementation lives in [`search`].

pub mod last;
pub mod search;
pub mod tables;

// Re-export main implementations
pub use search::{Search, SearchBuilder};
pub use tables::Snapshot;

use std::collections::btree_map;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::matchers::{glob_match, PatternError};

/// Errors returned by index queries.
#[derive(Debug, Error)]
pub enum SearchError {
    /// A tag pattern could not be compiled.
    #[error(transparent)]
    Pattern(#[from] PatternError),
    /// A wildcard alternative matched no known tag values.
    #[error("expr: no tags matching {key}={value}")]
    NoTagsMatching { key: String, value: String },
    /// A stored value is not a number.
    #[error("last: expected float64")]
    NotNumeric,
    /// Fewer than two points were ever recorded for the series.
    #[error("last: need two data points")]
    InsufficientData,
    /// No point was ever recorded for the series.
    #[error("last: no data for {metric}{tags}")]
    NoSeries { metric: String, tags: String },
    /// A tag set string was not of the form `{k=v,k2=v2}`.
    #[error("invalid tag set: {0}")]
    InvalidTagSet(String),
}

/// Feeds data points into an index.
pub trait Ingest: Send + Sync {
    /// Index a batch of data points.
    ///
    /// # Parameters
    ///
    /// - `batch` - Points to index, processed in the given order
    fn index(&self, batch: &[DataPoint]);
}

/// Read-only metadata queries answered from the published snapshot.
///
/// Every method returns a sorted, deduplicated list. Results may lag ingestion
/// by up to one publish interval.
pub trait MetadataStorage: Send + Sync {
    /// Get all known metric names.
    fn unique_metrics(&self) -> Vec<String>;

    /// Get the metrics that have carried the exact tag pair.
    ///
    /// # Parameters
    ///
    /// - `key` - Tag key
    /// - `value` - Tag value
    fn metrics_by_tag_pair(&self, key: &str, value: &str) -> Vec<String>;

    /// Get the tag keys seen for a metric.
    fn tag_keys_by_metric(&self, metric: &str) -> Vec<String>;

    /// Get the tag values seen for a metric and tag key.
    fn tag_values_by_metric_tag_key(&self, metric: &str, key: &str) -> Vec<String>;

    /// Get the tag values seen for a tag key across every metric.
    fn tag_values_by_tag_key(&self, key: &str) -> Vec<String>;

    /// Get the tag values for a metric and tag key, restricted to series whose
    /// other tags equal every entry of `filters`.
    ///
    /// # Parameters
    ///
    /// - `metric` - Metric name
    /// - `key` - Tag key whose values are returned
    /// - `filters` - Exact key/value pairs a series must carry to contribute
    fn filtered_tag_values_by_metric_tag_key(
        &self,
        metric: &str,
        key: &str,
        filters: &BTreeMap<String, String>,
    ) -> Vec<String>;

    /// Expand wildcard tag values in a query into concrete alternatives.
    ///
    /// Each tag value is split on `|`. Alternatives without `*`, and a bare
    /// `*`, are kept verbatim; the rest are replaced by every known value for
    /// that metric and key matching the glob. The query is left untouched if
    /// any alternative fails.
    ///
    /// # Errors
    ///
    /// Returns `SearchError::NoTagsMatching` if an alternative expands to nothing,
    /// or `SearchError::Pattern` if an alternative is not a valid pattern.
    fn expand(&self, query: &mut Query) -> Result<(), SearchError> {
        let mut expanded = Vec::with_capacity(query.tags.len());
        for (key, original) in query.tags.iter() {
            let mut values = Vec::new();
            for alternative in original.split('|').map(str::trim) {
                if alternative == "*" || !alternative.contains('*') {
                    values.push(alternative.to_string());
                    continue;
                }
                let known = self.tag_values_by_metric_tag_key(&query.metric, key);
                let matched = glob_match(alternative, &known)?;
                if matched.is_empty() {
                    return Err(SearchError::NoTagsMatching {
                        key: key.clone(),
                        value: original.clone(),
                    });
                }
                values.extend(matched);
            }
            expanded.push((key.clone(), values.join("|")));
        }

        for (key, value) in expanded {
            query.tags.insert(key, value);
        }
        Ok(())
    }
}

/// Reads the live last-two-points cache.
pub trait LastValue: Send + Sync {
    /// Get the latest value, or the rate between the last two values, for a series.
    ///
    /// # Parameters
    ///
    /// - `metric` - Metric name
    /// - `tags` - Exact tag set of the series
    /// - `diff` - Return the per-unit-time rate instead of the latest value
    ///
    /// # Errors
    ///
    /// Returns `NotNumeric`, `InsufficientData` or `NoSeries`.
    fn get_last_series(&self, metric: &str, tags: &TagSet, diff: bool) -> Result<f64, SearchError>;

    /// Like [`Self::get_last_series`], with the tag set in `{k=v,k2=v2}` form.
    ///
    /// Series whose tag values contain `,` or `=` cannot be named this way;
    /// use [`Self::get_last_series`] for those.
    ///
    /// # Errors
    ///
    /// Also returns `InvalidTagSet` if `tags` does not parse.
    fn get_last(&self, metric: &str, tags: &str, diff: bool) -> Result<f64, SearchError> {
        self.get_last_series(metric, &tags.parse::<TagSet>()?, diff)
    }
}

/// Combined trait for everything the daemon needs from the index.
pub trait FullStorage: Ingest + MetadataStorage + LastValue {}

/// An unordered set of tag key/value pairs.
///
/// Stored sorted by key so the canonical string form and hashing are stable.
/// The `{k=v,k2=v2}` string form does no escaping: a value containing `,` or
/// `=` prints the same as a different set and does not parse back to itself.
/// The serde form is a JSON object and has no such ambiguity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TagSet(BTreeMap<String, String>);

impl TagSet {
    /// Create an empty tag set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a tag, replacing any previous value for the key.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.0.insert(key.into(), value.into())
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, String> {
        self.0.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for TagSet {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

impl<'a> IntoIterator for &'a TagSet {
    type Item = (&'a String, &'a String);
    type IntoIter = btree_map::Iter<'a, String, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl From<TagSet> for BTreeMap<String, String> {
    fn from(tags: TagSet) -> Self {
        tags.0
    }
}

impl fmt::Display for TagSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, (k, v)) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{k}={v}")?;
        }
        f.write_str("}")
    }
}

impl FromStr for TagSet {
    type Err = SearchError;

    /// Parse `{k=v,k2=v2}`. An empty string or `{}` is the empty set.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Ok(Self::new());
        }
        let inner = s
            .strip_prefix('{')
            .and_then(|rest| rest.strip_suffix('}'))
            .ok_or_else(|| SearchError::InvalidTagSet(s.to_string()))?;

        let mut tags = Self::new();
        for part in inner.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let (k, v) =
                part.split_once('=').ok_or_else(|| SearchError::InvalidTagSet(s.to_string()))?;
            let (k, v) = (k.trim(), v.trim());
            if k.is_empty() || tags.insert(k, v).is_some() {
                return Err(SearchError::InvalidTagSet(s.to_string()));
            }
        }
        Ok(tags)
    }
}

/// The value carried by a data point.
///
/// Points normally carry numbers, but the ingestion format allows anything,
/// so non-numeric values are kept and rejected only when a number is needed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Number(f64),
    Text(String),
}

impl Value {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(v) => Some(*v),
            Self::Text(_) => None,
        }
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Number(v)
    }
}

/// A single observed measurement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataPoint {
    pub metric: String,
    pub timestamp: i64,
    pub value: Value,
    #[serde(default)]
    pub tags: TagSet,
}

impl DataPoint {
    /// Create a new data point.
    ///
    /// # Parameters
    ///
    /// - `metric` - Metric name
    /// - `tags` - Tag set identifying the series
    /// - `timestamp` - Observation time
    /// - `value` - Observed value
    ///
    /// # Returns
    ///
    /// Returns a new `DataPoint` instance.
    pub fn new(
        metric: impl Into<String>,
        tags: TagSet,
        timestamp: i64,
        value: impl Into<Value>,
    ) -> Self {
        Self { metric: metric.into(), timestamp, value: value.into(), tags }
    }
}

/// A distinct series: a metric and the full tag set it was seen with.
///
/// Equality and hashing cover both fields, so two points map to the same
/// series exactly when metric and tags are identical.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MetricTagSet {
    pub metric: String,
    pub tags: TagSet,
}

impl MetricTagSet {
    pub fn new(metric: impl Into<String>, tags: TagSet) -> Self {
        Self { metric: metric.into(), tags }
    }
}

impl fmt::Display for MetricTagSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.metric, self.tags)
    }
}

/// Key for the tag pair -> metrics table.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TagPair {
    pub key: String,
    pub value: String,
}

impl TagPair {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self { key: key.into(), value: value.into() }
    }
}

/// Key for the metric + tag key -> tag values table.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MetricTagKey {
    pub metric: String,
    pub key: String,
}

impl MetricTagKey {
    pub fn new(metric: impl Into<String>, key: impl Into<String>) -> Self {
        Self { metric: metric.into(), key: key.into() }
    }
}

/// A metric query whose tag values may hold `|` alternatives and `*` wildcards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Query {
    pub metric: String,
    #[serde(default)]
    pub tags: TagSet,
}

impl Query {
    pub fn new(metric: impl Into<String>, tags: TagSet) -> Self {
        Self { metric: metric.into(), tags }
    }
}
