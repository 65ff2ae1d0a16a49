//! Silence management handlers.
//!
//! Confirming or clearing a silence persists the silence set, so those calls
//! run on the blocking pool instead of the request task.

use std::collections::BTreeMap;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Serialize;
use time::OffsetDateTime;

use crate::http::state::AppState;
use crate::http::types::{ApiResponse, ClearParams, SilenceSetRequest};
use crate::sched::Silence;
use crate::timeutil::resolve_time;

/// An unsilence time in RFC3339 form.
#[derive(Debug, Serialize)]
struct Until(#[serde(with = "time::serde::rfc3339")] OffsetDateTime);

#[derive(Debug, Serialize)]
struct SilenceListing {
    silences: BTreeMap<String, Silence>,
    silenced: BTreeMap<String, Until>,
}

/// List all silences and the alerts they currently suppress.
pub async fn silences(State(state): State<AppState>) -> impl IntoResponse {
    let silenced = state
        .schedule
        .silenced()
        .into_iter()
        .map(|(ak, until)| (ak.to_string(), Until(until)))
        .collect();
    ApiResponse::success(SilenceListing { silences: state.schedule.silences(), silenced })
}

/// Preview or store a silence.
///
/// # Parameters
///
/// - `state` - Application state containing the schedule
/// - `req` - Silence window, patterns and confirm/edit flags
///
/// # Returns
///
/// Returns the preview map of alert to active flag, `null` once stored, or 400
/// if the request is invalid.
pub async fn set_silence(
    State(state): State<AppState>,
    Json(req): Json<SilenceSetRequest>,
) -> impl IntoResponse {
    let now = state.schedule.now();
    let (start, end) = match (resolve_time(&req.start, now), resolve_time(&req.end, now)) {
        (Ok(start), Ok(end)) => (start, end),
        (Err(e), _) | (_, Err(e)) => return ApiResponse::error(StatusCode::BAD_REQUEST, e),
    };

    let schedule = state.schedule.clone();
    let result = tokio::task::spawn_blocking(move || {
        schedule.add_silence(start, end, &req.alert, &req.tags, req.confirm, &req.edit)
    })
    .await;

    match result {
        Ok(Ok(Some(preview))) => {
            let preview: BTreeMap<String, bool> =
                preview.into_iter().map(|(ak, active)| (ak.to_string(), active)).collect();
            ApiResponse::success(preview)
        }
        Ok(Ok(None)) => ApiResponse::success(()),
        Ok(Err(e)) => ApiResponse::error(StatusCode::BAD_REQUEST, e),
        Err(e) => ApiResponse::error(StatusCode::INTERNAL_SERVER_ERROR, e),
    }
}

/// Remove a silence by ID.
pub async fn clear_silence(
    State(state): State<AppState>,
    Query(params): Query<ClearParams>,
) -> impl IntoResponse {
    let schedule = state.schedule.clone();
    match tokio::task::spawn_blocking(move || schedule.clear_silence(&params.id)).await {
        Ok(()) => ApiResponse::success(()),
        Err(e) => ApiResponse::error(StatusCode::INTERNAL_SERVER_ERROR, e),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::response::Response;
    use time::macros::datetime;

    use crate::alert::AlertKey;
    use crate::sched::{MemoryStore, Schedule, Status};
    use crate::storage::Search;

    use super::*;

    const NOW: OffsetDateTime = datetime!(2030-06-01 12:00 UTC);

    fn create_test_state() -> (AppState, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let schedule = Schedule::builder()
            .with_store(store.clone())
            .with_fixed_now(NOW)
            .build()
            .expect("memory store");
        for (ak, status) in [
            ("cpu{host=web-01}", Status::Critical),
            ("cpu{host=web-02}", Status::Normal),
            ("cpu{host=db-01}", Status::Warning),
        ] {
            schedule.set_status(AlertKey::parse(ak).expect("valid key"), status);
        }

        let state = AppState::builder()
            .with_search(Arc::new(Search::new()))
            .with_schedule(Arc::new(schedule))
            .build()
            .expect("valid configuration");
        (state, store)
    }

    async fn body_json(response: Response) -> (StatusCode, serde_json::Value) {
        let (parts, body) = response.into_parts();
        let body_bytes = axum::body::to_bytes(body, usize::MAX).await.expect("read body");
        let json = serde_json::from_slice(&body_bytes).expect("parse JSON");
        (parts.status, json)
    }

    fn request(confirm: bool) -> SilenceSetRequest {
        SilenceSetRequest {
            start: "now".to_string(),
            end: "now+1h".to_string(),
            alert: "cpu".to_string(),
            tags: "host=web*".to_string(),
            confirm,
            edit: String::new(),
        }
    }

    /// Preview lists matching alerts without storing anything.
    #[tokio::test]
    async fn test_preview_silence() {
        let (state, store) = create_test_state();

        let response =
            set_silence(State(state.clone()), Json(request(false))).await.into_response();
        let (status, json) = body_json(response).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            json["data"],
            serde_json::json!({"cpu{host=web-01}": true, "cpu{host=web-02}": false})
        );
        assert!(state.schedule.silences().is_empty());
        assert_eq!(store.save_count(), 0);
    }

    /// Confirmed silences are listed, suppress alerts, and can be cleared.
    #[tokio::test]
    async fn test_confirm_list_clear() {
        let (state, store) = create_test_state();

        let response = set_silence(State(state.clone()), Json(request(true))).await.into_response();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(store.save_count(), 1);

        let (_, json) = body_json(silences(State(state.clone())).await.into_response()).await;
        let listed = json["data"]["silences"].as_object().expect("silences object");
        assert_eq!(listed.len(), 1);
        let id = listed.keys().next().expect("one silence").clone();
        assert_eq!(json["data"]["silenced"]["cpu{host=web-01}"], "2030-06-01T13:00:00Z");
        assert_eq!(json["data"]["silenced"]["cpu{host=web-02}"], "2030-06-01T13:00:00Z");
        assert!(json["data"]["silenced"].get("cpu{host=db-01}").is_none());

        let response =
            clear_silence(State(state.clone()), Query(ClearParams { id })).await.into_response();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(state.schedule.silences().is_empty());
        assert_eq!(store.save_count(), 2);
    }

    /// Bad times and bad patterns are rejected with 400.
    #[tokio::test]
    async fn test_invalid_requests() {
        let (state, _) = create_test_state();

        let mut req = request(true);
        req.end = "whenever".to_string();
        let response = set_silence(State(state.clone()), Json(req)).await.into_response();
        let (status, _) = body_json(response).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let mut req = request(true);
        req.end = "now-1h".to_string();
        req.start = "now-2h".to_string();
        let response = set_silence(State(state.clone()), Json(req)).await.into_response();
        let (status, json) = body_json(response).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "end time must be in the future");

        let mut req = request(true);
        req.start = String::new();
        let response = set_silence(State(state), Json(req)).await.into_response();
        let (status, json) = body_json(response).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "both start and end must be specified");
    }
}
