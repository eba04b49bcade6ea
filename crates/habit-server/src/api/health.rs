use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;

use super::AppState;

/// `GET /healthz` -- ambient liveness probe; not part of the documented
/// HTTP surface, present on every deployable binary in this shape.
pub async fn health(State(_state): State<AppState>) -> impl IntoResponse {
    (StatusCode::OK, Json(serde_json::json!({ "status": "ok" })))
}
