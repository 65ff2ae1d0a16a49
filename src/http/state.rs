//! Application state shared by the HTTP handlers.

use std::io;
use std::sync::Arc;

use crate::sched::Schedule;
use crate::storage::FullStorage;

/// Application state shared across all HTTP handlers.
#[derive(Clone)]
pub struct AppState {
    /// Metric and tag index
    pub search: Arc<dyn FullStorage>,
    /// Alert status and silences
    pub schedule: Arc<Schedule>,
}

impl AppState {
    /// Create new application state.
    ///
    /// # Parameters
    ///
    /// - `search` - Index queried and fed by the handlers
    /// - `schedule` - Schedule owning the silences
    ///
    /// # Returns
    ///
    /// Returns configured `AppState` instance.
    pub fn new(search: Arc<dyn FullStorage>, schedule: Arc<Schedule>) -> Self {
        Self { search, schedule }
    }

    /// Get a builder for configuring application state step by step.
    pub fn builder() -> AppStateBuilder {
        AppStateBuilder::new()
    }
}

/// Builder for constructing AppState with fluent interface.
#[derive(Default)]
pub struct AppStateBuilder {
    search: Option<Arc<dyn FullStorage>>,
    schedule: Option<Arc<Schedule>>,
}

impl AppStateBuilder {
    /// Create a new builder with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the search index.
    ///
    /// # Parameters
    ///
    /// - `search` - Index implementation to use
    ///
    /// # Returns
    ///
    /// Returns the builder for method chaining.
    pub fn with_search(mut self, search: Arc<dyn FullStorage>) -> Self {
        self.search = Some(search);
        self
    }

    /// Set the schedule.
    ///
    /// # Parameters
    ///
    /// - `schedule` - Schedule owning alert status and silences
    ///
    /// # Returns
    ///
    /// Returns the builder for method chaining.
    pub fn with_schedule(mut self, schedule: Arc<Schedule>) -> Self {
        self.schedule = Some(schedule);
        self
    }

    /// Build the final AppState with validation.
    ///
    /// # Errors
    ///
    /// Returns error if the search index or the schedule is not provided.
    pub fn build(self) -> io::Result<AppState> {
        let search = self.search.ok_or(io::Error::new(
            io::ErrorKind::InvalidInput,
            "Search index is required for AppState",
        ))?;
        let schedule = self.schedule.ok_or(io::Error::new(
            io::ErrorKind::InvalidInput,
            "Schedule is required for AppState",
        ))?;

        Ok(AppState::new(search, schedule))
    }
}

#[cfg(test)]
mod tests {
    use crate::storage::Search;

    use super::*;

    /// Both dependencies are required.
    #[test]
    fn test_builder_requires_dependencies() {
        let schedule = Arc::new(Schedule::builder().build().expect("memory store"));
        let search: Arc<dyn FullStorage> = Arc::new(Search::new());

        let err = AppState::builder().with_schedule(schedule.clone()).build().err();
        assert_eq!(err.map(|e| e.kind()), Some(io::ErrorKind::InvalidInput));

        let err = AppState::builder().with_search(search.clone()).build().err();
        assert_eq!(err.map(|e| e.kind()), Some(io::ErrorKind::InvalidInput));

        assert!(AppState::builder().with_search(search).with_schedule(schedule).build().is_ok());
    }
}
