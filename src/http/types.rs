//! API types and parameters for HTTP handlers.

use axum::{http::StatusCode, Json};
use serde::{Deserialize, Serialize};

use crate::storage::TagSet;

/// Query parameters for the `/api/last` endpoint.
#[derive(Debug, Deserialize)]
pub struct LastParams {
    /// Metric name
    pub metric: String,
    /// Tag set in `{k=v,k2=v2}` form
    #[serde(default)]
    pub tags: String,
    /// Return the rate between the last two points
    #[serde(default)]
    pub diff: bool,
}

/// Body of `POST /api/last`, naming the series by its exact tag map.
#[derive(Debug, Deserialize)]
pub struct LastRequest {
    pub metric: String,
    #[serde(default)]
    pub tags: TagSet,
    #[serde(default)]
    pub diff: bool,
}

/// Body of the `/api/silence/set` endpoint.
#[derive(Debug, Default, Deserialize)]
pub struct SilenceSetRequest {
    /// Window start (RFC3339, UNIX seconds, or "now[+-]<N><unit>")
    #[serde(default)]
    pub start: String,
    /// Window end, same formats as `start`
    #[serde(default)]
    pub end: String,
    /// Alert name pattern, empty for any
    #[serde(default)]
    pub alert: String,
    /// Comma separated `k=pattern` list
    #[serde(default)]
    pub tags: String,
    /// Store the silence instead of previewing it
    #[serde(default)]
    pub confirm: bool,
    /// ID of a silence to replace
    #[serde(default)]
    pub edit: String,
}

/// Query parameters for the `/api/silence/clear` endpoint.
#[derive(Debug, Deserialize)]
pub struct ClearParams {
    pub id: String,
}

/// API response envelope.
#[derive(Debug, Serialize)]
pub struct ApiResponse {
    /// Response status ("success" | "error")
    pub status: &'static str,
    /// Response data payload
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    /// Error message
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ApiResponse {
    /// A 200 response wrapping `data`.
    pub fn success(data: impl Serialize) -> (StatusCode, Json<Self>) {
        match serde_json::to_value(data) {
            Ok(data) => {
                (StatusCode::OK, Json(Self { status: "success", data: Some(data), error: None }))
            }
            Err(e) => Self::error(StatusCode::INTERNAL_SERVER_ERROR, e),
        }
    }

    /// An error response carrying `error`'s message.
    pub fn error(code: StatusCode, error: impl std::fmt::Display) -> (StatusCode, Json<Self>) {
        tracing::warn!(%error, status = code.as_u16(), "request failed");
        (code, Json(Self { status: "error", data: None, error: Some(error.to_string()) }))
    }
}
