//! Alert schedule state shared with the silence engine.
//!
//! The schedule owns the current status of every tracked alert and the set of
//! silences. Both live behind a single lock; silence operations run entirely
//! inside it and persist the silence set after releasing it. Each mutation
//! takes a generation number under that lock, and a persisted set is never
//! replaced by one with an older generation.

pub mod silence;
pub mod store;

pub use silence::{CompiledSilence, Silence, SilenceError};
pub use store::{JsonFileStore, MemoryStore, SilenceStore, StoreError};

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use fnv::FnvHashMap;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tracing::{debug, error};

use crate::alert::AlertKey;

/// Evaluation status of one alert instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Normal,
    Warning,
    Critical,
    Unknown,
}

impl Status {
    /// Anything other than `Normal` is active.
    pub fn is_active(self) -> bool {
        self != Self::Normal
    }
}

/// State guarded by the schedule lock.
#[derive(Default)]
pub(crate) struct ScheduleState {
    pub(crate) status: FnvHashMap<AlertKey, Status>,
    pub(crate) silences: BTreeMap<String, Silence>,
    /// bumped on every silence mutation
    pub(crate) generation: u64,
}

/// Alert status and silences for the whole daemon.
pub struct Schedule {
    state: Mutex<ScheduleState>,
    /// generation of the last silence set handed to the store
    saved_generation: Mutex<u64>,
    store: Arc<dyn SilenceStore>,
    fixed_now: Option<OffsetDateTime>,
}

impl Schedule {
    /// Get a builder for configuring the schedule.
    pub fn builder() -> ScheduleBuilder {
        ScheduleBuilder::new()
    }

    /// Current time, or the fixed time if one was configured.
    pub fn now(&self) -> OffsetDateTime {
        self.fixed_now.unwrap_or_else(OffsetDateTime::now_utc)
    }

    /// Record the latest evaluated status of an alert instance.
    ///
    /// # Parameters
    ///
    /// - `key` - Alert instance
    /// - `status` - Its current status
    pub fn set_status(&self, key: AlertKey, status: Status) {
        self.lock().status.insert(key, status);
    }

    pub fn status(&self, key: &AlertKey) -> Option<Status> {
        self.lock().status.get(key).copied()
    }

    /// All silences keyed by ID.
    pub fn silences(&self) -> BTreeMap<String, Silence> {
        self.lock().silences.clone()
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, ScheduleState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Bump the silence generation and snapshot the silence set.
    ///
    /// The caller holds the schedule lock and passes the result to [`Self::save`].
    pub(crate) fn next_generation(state: &mut ScheduleState) -> (u64, BTreeMap<String, Silence>) {
        state.generation += 1;
        (state.generation, state.silences.clone())
    }

    /// Persist the silence set taken at `generation`. Failures are logged,
    /// never returned.
    ///
    /// Saves are serialized, and a set older than the last one written is
    /// dropped. Must be called without holding the schedule lock.
    pub(crate) fn save(&self, generation: u64, silences: &BTreeMap<String, Silence>) {
        let mut saved = self.saved_generation.lock().unwrap_or_else(PoisonError::into_inner);
        if generation <= *saved {
            debug!(generation, saved = *saved, "skipping stale silence save");
            return;
        }
        *saved = generation;
        if let Err(e) = self.store.save(silences) {
            error!(error = %e, generation, count = silences.len(), "failed to persist silences");
        }
    }
}

/// Builder for constructing a `Schedule` with a fluent interface.
#[derive(Default)]
pub struct ScheduleBuilder {
    store: Option<Arc<dyn SilenceStore>>,
    fixed_now: Option<OffsetDateTime>,
}

impl ScheduleBuilder {
    /// Create a new builder with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set where silences are persisted and restored from.
    ///
    /// # Parameters
    ///
    /// - `store` - Silence persistence backend
    ///
    /// # Returns
    ///
    /// Returns the builder for method chaining.
    pub fn with_store(mut self, store: Arc<dyn SilenceStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Set a fixed clock for deterministic testing.
    ///
    /// # Parameters
    ///
    /// - `fixed_now` - Time returned by [`Schedule::now`]
    ///
    /// # Returns
    ///
    /// Returns the builder for method chaining.
    pub fn with_fixed_now(mut self, fixed_now: OffsetDateTime) -> Self {
        self.fixed_now = Some(fixed_now);
        self
    }

    /// Build the schedule, restoring any persisted silences.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the store exists but cannot be read.
    pub fn build(self) -> Result<Schedule, StoreError> {
        let store = self
            .store
            .unwrap_or_else(|| Arc::new(MemoryStore::new()) as Arc<dyn SilenceStore>);
        let silences = store.load()?;
        let state = ScheduleState { status: FnvHashMap::default(), silences, generation: 0 };
        Ok(Schedule {
            state: Mutex::new(state),
            saved_generation: Mutex::new(0),
            store,
            fixed_now: self.fixed_now,
        })
    }
}
