//! HTTP routing configuration for all API endpoints.

use axum::{
    routing::{get, post},
    Router,
};

use crate::http::handlers::*;
use crate::http::state::AppState;

/// Build the Axum router with all API endpoints.
///
/// # Parameters
///
/// - `state` - Application state containing the index and the schedule
///
/// # Returns
///
/// Returns configured Axum `Router` with all API endpoints.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        // Ingestion
        .route("/api/index", post(index))
        // Search index queries
        .route("/api/metric", get(metrics))
        .route("/api/metric/{tagk}/{tagv}", get(metrics_by_tag_pair))
        .route("/api/tagk/{metric}", get(tag_keys))
        .route("/api/tagv/{tagk}", get(tag_values))
        .route("/api/tagv/{tagk}/{metric}", get(metric_tag_values))
        .route("/api/last", get(last).post(last_series))
        .route("/api/expand", post(expand))
        // Silences
        .route("/api/silence/get", get(silences))
        .route("/api/silence/set", post(set_silence))
        .route("/api/silence/clear", post(clear_silence))
        .with_state(state)
}
