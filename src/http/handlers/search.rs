//! Search index query handlers.

use std::collections::BTreeMap;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};

use crate::http::state::AppState;
use crate::http::types::{ApiResponse, LastParams, LastRequest};
use crate::storage::Query as MetricQuery;

/// Get all known metric names.
pub async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    ApiResponse::success(state.search.unique_metrics())
}

/// Get the metrics that carried a tag pair.
///
/// # Parameters
///
/// - `state` - Application state containing the index
/// - `tagk`, `tagv` - Tag key and value from the path
///
/// # Returns
///
/// Returns a sorted array of metric names.
pub async fn metrics_by_tag_pair(
    State(state): State<AppState>,
    Path((tagk, tagv)): Path<(String, String)>,
) -> impl IntoResponse {
    ApiResponse::success(state.search.metrics_by_tag_pair(&tagk, &tagv))
}

/// Get the tag keys seen for a metric.
pub async fn tag_keys(
    State(state): State<AppState>,
    Path(metric): Path<String>,
) -> impl IntoResponse {
    ApiResponse::success(state.search.tag_keys_by_metric(&metric))
}

/// Get the values of a tag key across all metrics.
pub async fn tag_values(
    State(state): State<AppState>,
    Path(tagk): Path<String>,
) -> impl IntoResponse {
    ApiResponse::success(state.search.tag_values_by_tag_key(&tagk))
}

/// Get the values of a tag key for one metric.
///
/// # Parameters
///
/// - `state` - Application state containing the index
/// - `tagk`, `metric` - Tag key and metric from the path
/// - `filters` - Query parameters; when present only series carrying every
///   pair contribute values
///
/// # Returns
///
/// Returns a sorted array of tag values.
pub async fn metric_tag_values(
    State(state): State<AppState>,
    Path((tagk, metric)): Path<(String, String)>,
    Query(filters): Query<BTreeMap<String, String>>,
) -> impl IntoResponse {
    let values = if filters.is_empty() {
        state.search.tag_values_by_metric_tag_key(&metric, &tagk)
    } else {
        state.search.filtered_tag_values_by_metric_tag_key(&metric, &tagk, &filters)
    };
    ApiResponse::success(values)
}

/// Get the latest value, or rate, of one series.
pub async fn last(
    State(state): State<AppState>,
    Query(params): Query<LastParams>,
) -> impl IntoResponse {
    match state.search.get_last(&params.metric, &params.tags, params.diff) {
        Ok(value) => ApiResponse::success(value),
        Err(e) => ApiResponse::error(StatusCode::BAD_REQUEST, e),
    }
}

/// Get the latest value, or rate, of one series named by a JSON tag map.
///
/// Unlike [`last`] this reaches series whose tag values contain `,` or `=`.
pub async fn last_series(
    State(state): State<AppState>,
    Json(req): Json<LastRequest>,
) -> impl IntoResponse {
    match state.search.get_last_series(&req.metric, &req.tags, req.diff) {
        Ok(value) => ApiResponse::success(value),
        Err(e) => ApiResponse::error(StatusCode::BAD_REQUEST, e),
    }
}

/// Expand wildcard tag values of a query into concrete alternatives.
pub async fn expand(
    State(state): State<AppState>,
    Json(mut query): Json<MetricQuery>,
) -> impl IntoResponse {
    match state.search.expand(&mut query) {
        Ok(()) => ApiResponse::success(query),
        Err(e) => ApiResponse::error(StatusCode::BAD_REQUEST, e),
    }
}
