//! # Tag Search
//!
//! Indexing and alert-suppression core of a metrics monitoring daemon.
//!
//! This library provides components for:
//! - **Search Index**: metric/tag cross-reference tables built from ingested
//!   points, read through periodically published snapshots
//! - **Last Values**: latest value and rate of change per series
//! - **Glob Matching**: the restricted pattern language shared by tag
//!   expansion and silences
//! - **Silences**: time-bounded rules suppressing notifications for alerts
//!
//! # Examples
//!
//! ```no_run
//! use std::sync::Arc;
//! use tagsearch::{http::build_router, Schedule, Search};
//!
//! # async fn example() -> std::io::Result<()> {
//! let search = Arc::new(Search::new());
//! let _publisher = search.spawn_publisher();
//! let schedule = Arc::new(Schedule::builder().build().map_err(std::io::Error::other)?);
//!
//! let state = tagsearch::http::AppState::builder()
//!     .with_search(search)
//!     .with_schedule(schedule)
//!     .build()?;
//! let app = build_router(state);
//! # Ok(())
//! # }
//! ```

pub mod alert;
pub mod http;
pub mod matchers;
pub mod sched;
pub mod storage;
pub mod timeutil;

// Re-export commonly used types for convenience
pub use alert::AlertKey;
pub use matchers::{glob_match, GlobPattern, PatternError};
pub use sched::{Schedule, Silence, Status};
pub use storage::{
    DataPoint, FullStorage, Ingest, LastValue, MetadataStorage, Query, Search, SearchError, TagSet,
    Value,
};
