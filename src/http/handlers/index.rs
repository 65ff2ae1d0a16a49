//! Ingestion handler feeding decoded data points into the index.

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use tracing::debug;

use crate::http::state::AppState;
use crate::storage::DataPoint;

/// Index a JSON array of data points.
///
/// # Parameters
///
/// - `state` - Application state containing the index
/// - `points` - Decoded data points, indexed in order
///
/// # Returns
///
/// Returns HTTP 204 on success.
pub async fn index(
    State(state): State<AppState>,
    Json(points): Json<Vec<DataPoint>>,
) -> impl IntoResponse {
    debug!("received {} data points", points.len());
    state.search.index(&points);
    StatusCode::NO_CONTENT
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::sched::Schedule;
    use crate::storage::{LastValue, Search};

    use super::*;

    /// Posted points reach the live cache immediately.
    #[tokio::test]
    async fn test_index_points() {
        let search = Arc::new(Search::new());
        let state = AppState::builder()
            .with_search(search.clone())
            .with_schedule(Arc::new(Schedule::builder().build().expect("memory store")))
            .build()
            .expect("valid configuration");

        let points: Vec<DataPoint> = serde_json::from_str(
            r#"[
                {"metric": "cpu", "timestamp": 1, "value": 2.5, "tags": {"host": "web-01"}},
                {"metric": "cpu", "timestamp": 2, "value": 3.5, "tags": {"host": "web-01"}}
            ]"#,
        )
        .expect("valid JSON");

        let response = index(State(state), Json(points)).await.into_response();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert_eq!(search.get_last("cpu", "{host=web-01}", false).expect("indexed"), 3.5);
        assert!(search.publish_pending());
    }
}
