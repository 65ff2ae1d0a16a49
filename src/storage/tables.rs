//! Cross-reference tables built from ingested points.
//!
//! `IndexTables` is the mutable form owned by the writer. A [`Snapshot`] is an
//! immutable copy handed to readers; it is never modified after publication.

use std::collections::{BTreeMap, BTreeSet};

use fnv::{FnvHashMap, FnvHashSet};

use crate::storage::{DataPoint, MetricTagKey, MetricTagSet, TagPair};

/// The four cross-reference tables.
#[derive(Debug, Clone, Default)]
pub struct IndexTables {
    /// tag key + tag value -> metrics
    metrics_by_pair: FnvHashMap<TagPair, BTreeSet<String>>,
    /// metric -> tag keys
    tag_keys: FnvHashMap<String, BTreeSet<String>>,
    /// metric + tag key -> tag values
    tag_values: FnvHashMap<MetricTagKey, BTreeSet<String>>,
    /// every distinct series
    series: FnvHashSet<MetricTagSet>,
}

impl IndexTables {
    /// Record one point in every table.
    ///
    /// # Parameters
    ///
    /// - `dp` - Point to record
    /// - `series` - The point's series identity
    pub fn insert(&mut self, dp: &DataPoint, series: &MetricTagSet) {
        if !self.series.contains(series) {
            self.series.insert(series.clone());
        }

        let keys = self.tag_keys.entry(dp.metric.clone()).or_default();
        for (k, v) in &dp.tags {
            keys.insert(k.clone());
            self.metrics_by_pair
                .entry(TagPair::new(k.as_str(), v.as_str()))
                .or_default()
                .insert(dp.metric.clone());
            self.tag_values
                .entry(MetricTagKey::new(dp.metric.as_str(), k.as_str()))
                .or_default()
                .insert(v.clone());
        }
    }

    pub fn series_count(&self) -> usize {
        self.series.len()
    }
}

/// An immutable, published copy of the index tables.
#[derive(Debug, Default)]
pub struct Snapshot {
    tables: IndexTables,
    generation: u64,
}

impl Snapshot {
    /// Wrap a copy of the tables as publication number `generation`.
    pub fn new(tables: IndexTables, generation: u64) -> Self {
        Self { tables, generation }
    }

    /// How many publishes produced this snapshot; the empty initial snapshot is 0.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn series_count(&self) -> usize {
        self.tables.series_count()
    }

    pub fn unique_metrics(&self) -> Vec<String> {
        sorted(self.tables.tag_keys.keys().cloned())
    }

    pub fn metrics_by_tag_pair(&self, key: &str, value: &str) -> Vec<String> {
        collect(self.tables.metrics_by_pair.get(&TagPair::new(key, value)))
    }

    pub fn tag_keys_by_metric(&self, metric: &str) -> Vec<String> {
        collect(self.tables.tag_keys.get(metric))
    }

    pub fn tag_values_by_metric_tag_key(&self, metric: &str, key: &str) -> Vec<String> {
        collect(self.tables.tag_values.get(&MetricTagKey::new(metric, key)))
    }

    pub fn tag_values_by_tag_key(&self, key: &str) -> Vec<String> {
        let values: BTreeSet<&String> = self
            .tables
            .tag_keys
            .keys()
            .filter_map(|metric| {
                self.tables.tag_values.get(&MetricTagKey::new(metric.as_str(), key))
            })
            .flatten()
            .collect();
        values.into_iter().cloned().collect()
    }

    /// Scan the series registry for series of `metric` carrying `key` whose
    /// tags include every filter pair exactly.
    pub fn filtered_tag_values_by_metric_tag_key(
        &self,
        metric: &str,
        key: &str,
        filters: &BTreeMap<String, String>,
    ) -> Vec<String> {
        let values: BTreeSet<&str> = self
            .tables
            .series
            .iter()
            .filter(|mts| mts.metric == metric)
            .filter(|mts| filters.iter().all(|(fk, fv)| mts.tags.get(fk) == Some(fv.as_str())))
            .filter_map(|mts| mts.tags.get(key))
            .collect();
        values.into_iter().map(str::to_string).collect()
    }
}

fn collect(set: Option<&BTreeSet<String>>) -> Vec<String> {
    set.map(|s| s.iter().cloned().collect()).unwrap_or_default()
}

fn sorted(items: impl Iterator<Item = String>) -> Vec<String> {
    let mut items: Vec<String> = items.collect();
    items.sort();
    items
}
