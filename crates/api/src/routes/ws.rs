use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use serde::Deserialize;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::warn;

use common::ScanReport;

use crate::AppState;

pub fn ws_router() -> Router<AppState> {
    Router::new().route("/ws/scan", get(ws_scan_handler))
}

#[derive(Deserialize)]
struct WsQuery {
    token: Option<String>,
}

/// WebSocket endpoint that pushes every applied scan report to the dashboard.
/// Auth via query param `?token=<DASHBOARD_TOKEN>` (browsers can't set custom
/// WS headers).
async fn ws_scan_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Query(q): Query<WsQuery>,
) -> Response {
    let authed = q.token.as_deref() == Some(state.dashboard_token.as_str());
    if !authed {
        return (StatusCode::UNAUTHORIZED, "unauthorized").into_response();
    }

    // Subscribe before reading the snapshot so no report slips between them.
    let report_rx = state.table.subscribe();
    let current = state.table.snapshot().await;
    ws.on_upgrade(move |socket| handle_ws(socket, current, report_rx))
}

async fn send_report(socket: &mut WebSocket, report: &ScanReport) -> bool {
    let text = match serde_json::to_string(report) {
        Ok(text) => text,
        Err(e) => {
            warn!(error = %e, "Failed to encode scan report");
            return true;
        }
    };
    socket.send(Message::Text(text)).await.is_ok()
}

async fn handle_ws(
    mut socket: WebSocket,
    current: Option<ScanReport>,
    mut report_rx: broadcast::Receiver<ScanReport>,
) {
    let mut last_sent = 0;
    if let Some(report) = current {
        if !send_report(&mut socket, &report).await {
            return;
        }
        last_sent = report.generation;
    }

    loop {
        match report_rx.recv().await {
            Ok(report) => {
                if report.generation <= last_sent {
                    continue;
                }
                if !send_report(&mut socket, &report).await {
                    break;
                }
                last_sent = report.generation;
            }
            Err(RecvError::Lagged(n)) => {
                warn!(dropped = n, "WebSocket scan client lagged");
            }
            Err(RecvError::Closed) => break,
        }
    }
}
