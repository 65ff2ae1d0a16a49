//! HTTP handlers for different API endpoints.

pub mod index;
pub mod search;
pub mod silence;

// Re-export handlers for easier access
pub use index::index;
pub use search::{
    expand, last, last_series, metric_tag_values, metrics, metrics_by_tag_pair, tag_keys,
    tag_values,
};
pub use silence::{clear_silence, set_silence, silences};

/// Health check endpoint.
pub async fn healthz() -> &'static str {
    "ok"
}
