//! In-memory search index.
//!
//! Writers update the live tables under one mutex. Readers never touch that
//! mutex: they load the most recently published [`Snapshot`] through an
//! atomic pointer. A publish is scheduled by the first ingestion after the
//! previous publish and runs `publish_delay` later on the publisher task, so
//! readers may see data up to one delay old.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::time::Duration;

use arc_swap::ArcSwap;
use fnv::FnvHashMap;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::storage::last::LastPair;
use crate::storage::tables::{IndexTables, Snapshot};
use crate::storage::{
    DataPoint, FullStorage, Ingest, LastValue, MetadataStorage, MetricTagSet, SearchError, TagSet,
};

/// Default delay between the first ingestion and the snapshot publish.
pub const DEFAULT_PUBLISH_DELAY: Duration = Duration::from_secs(60);

/// Writer-side state guarded by one lock.
#[derive(Default)]
struct Live {
    tables: IndexTables,
    /// Set when a publish is pending; cleared once it has completed.
    publish_scheduled: bool,
}

/// Search index over ingested metric and tag data.
pub struct Search {
    live: Mutex<Live>,
    read: ArcSwap<Snapshot>,
    last: RwLock<FnvHashMap<MetricTagSet, LastPair>>,
    publish_wakeup: Notify,
    publish_delay: Duration,
}

impl Default for Search {
    fn default() -> Self {
        Self::new()
    }
}

impl Search {
    /// Create an empty index with the default publish delay.
    ///
    /// # Returns
    ///
    /// Returns a new `Search` with empty tables and an empty published snapshot.
    pub fn new() -> Self {
        Self::with_publish_delay(DEFAULT_PUBLISH_DELAY)
    }

    fn with_publish_delay(publish_delay: Duration) -> Self {
        Self {
            live: Mutex::new(Live::default()),
            read: ArcSwap::from_pointee(Snapshot::default()),
            last: RwLock::new(FnvHashMap::default()),
            publish_wakeup: Notify::new(),
            publish_delay,
        }
    }

    /// Get a builder for configuring the index.
    pub fn builder() -> SearchBuilder {
        SearchBuilder::new()
    }

    pub fn publish_delay(&self) -> Duration {
        self.publish_delay
    }

    /// Whether a publish has been scheduled and not yet completed.
    pub fn publish_pending(&self) -> bool {
        self.lock_live().publish_scheduled
    }

    /// The snapshot readers currently see.
    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.read.load_full()
    }

    /// Number of distinct series in the live tables.
    pub fn series_count(&self) -> usize {
        self.lock_live().tables.series_count()
    }

    /// Publish the live tables immediately.
    ///
    /// Does not affect a pending debounced publish.
    pub fn force_publish(&self) {
        let live = self.lock_live();
        self.publish_locked(&live);
    }

    /// Start the background task that performs debounced publishes.
    ///
    /// # Returns
    ///
    /// Returns the task handle; the task runs until aborted.
    pub fn spawn_publisher(self: &Arc<Self>) -> JoinHandle<()> {
        tokio::spawn(Arc::clone(self).run_publisher())
    }

    /// Wait for ingestion to schedule a publish, sleep the publish delay, then publish.
    pub async fn run_publisher(self: Arc<Self>) {
        loop {
            self.publish_wakeup.notified().await;
            tokio::time::sleep(self.publish_delay).await;
            self.complete_scheduled_publish();
        }
    }

    fn complete_scheduled_publish(&self) {
        let mut live = self.lock_live();
        self.publish_locked(&live);
        live.publish_scheduled = false;
    }

    /// Copy the tables into a new snapshot. The caller holds the live lock.
    fn publish_locked(&self, live: &Live) {
        let generation = self.read.load().generation() + 1;
        let snapshot = Snapshot::new(live.tables.clone(), generation);
        debug!(generation, series = snapshot.series_count(), "published search snapshot");
        self.read.store(Arc::new(snapshot));
    }

    fn lock_live(&self) -> MutexGuard<'_, Live> {
        self.live.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Ingest for Search {
    fn index(&self, batch: &[DataPoint]) {
        let mut live = self.lock_live();
        if !live.publish_scheduled {
            live.publish_scheduled = true;
            self.publish_wakeup.notify_one();
        }

        let mut last = self.last.write().unwrap_or_else(PoisonError::into_inner);
        for dp in batch {
            let series = MetricTagSet::new(dp.metric.as_str(), dp.tags.clone());
            live.tables.insert(dp, &series);
            last.entry(series).or_default().push(dp.timestamp, &dp.value);
        }
        debug!(points = batch.len(), "indexed batch");
    }
}

impl MetadataStorage for Search {
    fn unique_metrics(&self) -> Vec<String> {
        self.read.load().unique_metrics()
    }

    fn metrics_by_tag_pair(&self, key: &str, value: &str) -> Vec<String> {
        self.read.load().metrics_by_tag_pair(key, value)
    }

    fn tag_keys_by_metric(&self, metric: &str) -> Vec<String> {
        self.read.load().tag_keys_by_metric(metric)
    }

    fn tag_values_by_metric_tag_key(&self, metric: &str, key: &str) -> Vec<String> {
        self.read.load().tag_values_by_metric_tag_key(metric, key)
    }

    fn tag_values_by_tag_key(&self, key: &str) -> Vec<String> {
        self.read.load().tag_values_by_tag_key(key)
    }

    fn filtered_tag_values_by_metric_tag_key(
        &self,
        metric: &str,
        key: &str,
        filters: &BTreeMap<String, String>,
    ) -> Vec<String> {
        self.read.load().filtered_tag_values_by_metric_tag_key(metric, key, filters)
    }
}

impl LastValue for Search {
    fn get_last_series(&self, metric: &str, tags: &TagSet, diff: bool) -> Result<f64, SearchError> {
        let series = MetricTagSet::new(metric, tags.clone());
        let last = self.last.read().unwrap_or_else(PoisonError::into_inner);
        match last.get(&series) {
            Some(pair) => pair.value(diff),
            None => Err(SearchError::NoSeries {
                metric: series.metric.clone(),
                tags: series.tags.to_string(),
            }),
        }
    }
}

impl FullStorage for Search {}

/// Builder for constructing a `Search` with a fluent interface.
#[derive(Default)]
pub struct SearchBuilder {
    publish_delay: Option<Duration>,
}

impl SearchBuilder {
    /// Create a new builder with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the delay between the first ingestion and the snapshot publish.
    ///
    /// # Parameters
    ///
    /// - `delay` - Debounce interval
    ///
    /// # Returns
    ///
    /// Returns the builder for method chaining.
    pub fn with_publish_delay(mut self, delay: Duration) -> Self {
        self.publish_delay = Some(delay);
        self
    }

    /// Build the index.
    pub fn build(self) -> Search {
        Search::with_publish_delay(self.publish_delay.unwrap_or(DEFAULT_PUBLISH_DELAY))
    }
}
