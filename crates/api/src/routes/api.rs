use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, warn};

use common::ScanRow;
use engine::FactSheet;
use strategy::ProjectionSchedule;

use crate::{auth::require_auth, AppState};

pub fn api_router(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/api/scan", get(get_scan).post(post_scan))
        .route("/api/summary/:symbol", get(get_summary))
        .route("/api/projection/:symbol", get(get_projection))
        .route_layer(middleware::from_fn_with_state(state, require_auth))
}

fn error(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(json!({ "error": message.into() }))).into_response()
}

async fn find_row(state: &AppState, symbol: &str) -> Option<ScanRow> {
    state
        .table
        .snapshot()
        .await?
        .rows
        .into_iter()
        .find(|r| r.symbol.eq_ignore_ascii_case(symbol))
}

// ─── Scan ─────────────────────────────────────────────────────────────────────

async fn get_scan(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "generation": state.table.latest_generation(),
        "report": state.table.snapshot().await,
    }))
}

#[derive(Deserialize)]
struct ScanQuery {
    filter: Option<String>,
}

async fn post_scan(State(state): State<AppState>, Query(q): Query<ScanQuery>) -> (StatusCode, Json<Value>) {
    let generation = state.start_scan(q.filter.clone());
    info!(generation, filter = ?q.filter, "Scan requested");
    (StatusCode::ACCEPTED, Json(json!({ "generation": generation })))
}

// ─── Summary ──────────────────────────────────────────────────────────────────

async fn get_summary(State(state): State<AppState>, Path(symbol): Path<String>) -> Response {
    let Some(client) = state.narrative.clone() else {
        return error(StatusCode::SERVICE_UNAVAILABLE, "narrative summaries are not configured");
    };
    let Some(row) = find_row(&state, &symbol).await else {
        return error(StatusCode::NOT_FOUND, format!("{symbol} is not in the latest scan"));
    };

    let sheet = FactSheet::from_row(&row);
    match client.summarize(&sheet.prompt()).await {
        Ok(summary) => Json(json!({ "facts": sheet, "summary": summary })).into_response(),
        Err(e) => {
            warn!(symbol = %row.symbol, error = %e, "Narrative summary failed");
            error(StatusCode::BAD_GATEWAY, e.to_string())
        }
    }
}

// ─── Projection ───────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct ProjectionQuery {
    amount: Option<f64>,
}

async fn get_projection(
    State(state): State<AppState>,
    Path(symbol): Path<String>,
    Query(q): Query<ProjectionQuery>,
) -> Response {
    let amount = q.amount.unwrap_or(1_000.0);
    if !amount.is_finite() || amount <= 0.0 {
        return error(StatusCode::BAD_REQUEST, "amount must be a positive number");
    }
    let Some(row) = find_row(&state, &symbol).await else {
        return error(StatusCode::NOT_FOUND, format!("{symbol} is not in the latest scan"));
    };
    let Some(cagr) = row.projected_annual_return else {
        return error(StatusCode::UNPROCESSABLE_ENTITY, format!("{} has no projected return", row.symbol));
    };

    Json(json!({
        "symbol": row.symbol,
        "projection": ProjectionSchedule::new(amount, cagr),
    }))
    .into_response()
}
