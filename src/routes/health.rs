use axum::{extract::State, http::StatusCode, response::Json};
use serde_json::{json, Value};

use crate::graphql::metrics::MetricsRow;
use crate::state::AppState;

pub async fn health_check() -> (StatusCode, Json<Value>) {
    (StatusCode::OK, Json(json!({ "status": "ok" })))
}

pub async fn metrics(State(state): State<AppState>) -> Json<Vec<MetricsRow>> {
    Json(state.metrics().snapshot())
}
