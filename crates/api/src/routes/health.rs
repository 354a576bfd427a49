use axum::{extract::State, routing::get, Json, Router};
use serde_json::{json, Value};

use crate::AppState;

pub fn health_router() -> Router<AppState> {
    Router::new().route("/healthz", get(healthz))
}

/// Health check endpoint. No auth required.
async fn healthz(State(state): State<AppState>) -> Json<Value> {
    let latest = state.table.snapshot().await;
    Json(json!({
        "status": "ok",
        "generation": state.table.latest_generation(),
        "applied_generation": latest.as_ref().map(|r| r.generation),
        "rows": latest.as_ref().map_or(0, |r| r.rows.len()),
        "last_completed_at": latest.as_ref().map(|r| r.completed_at.to_rfc3339()),
        "universe": state.scanner.universe().len(),
    }))
}
