//! Request handlers for the API endpoints.

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::telemetry::LatestSnapshot;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub has_telemetry: bool,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// `GET /state` → 200 + latest `TelemetrySnapshot`, or 404 before the first tick.
pub async fn get_state(State(latest): State<LatestSnapshot>) -> Response {
    match latest.latest() {
        Some(snapshot) => Json(&*snapshot).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: "no telemetry yet".to_string(),
            }),
        )
            .into_response(),
    }
}

/// `GET /health` → 200 + `HealthResponse`.
pub async fn get_health(State(latest): State<LatestSnapshot>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        has_telemetry: latest.latest().is_some(),
    })
}
