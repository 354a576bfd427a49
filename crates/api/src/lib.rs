mod auth;
pub mod routes;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use tower_http::compression::CompressionLayer;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use common::NarrativeClient;
use engine::{ScanTable, Scanner};

/// Shared application state injected into every route handler.
#[derive(Clone)]
pub struct AppState {
    pub table: ScanTable,
    pub scanner: Arc<Scanner>,
    /// `None` when no narrative service is configured.
    pub narrative: Option<Arc<dyn NarrativeClient>>,
    pub dashboard_token: String,
}

impl AppState {
    /// Start a scan in the background and return its generation.
    ///
    /// Scans are never cancelled; a superseded scan runs to completion and
    /// its report is discarded by the table.
    pub fn start_scan(&self, filter: Option<String>) -> u64 {
        let generation = self.table.begin();
        let scanner = self.scanner.clone();
        let table = self.table.clone();
        tokio::spawn(async move {
            scanner.scan_into(&table, filter.as_deref(), generation).await;
        });
        generation
    }
}

/// The full router with middleware applied.
pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_headers(Any)
        .allow_methods(Any);

    Router::new()
        .merge(routes::api_router(state.clone()))
        .merge(routes::ws_router())
        .merge(routes::health_router())
        .with_state(state)
        .layer(CompressionLayer::new())
        .layer(cors)
}

/// Build and run the Axum API server.
pub async fn serve(state: AppState, port: u16) -> common::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "Dashboard API listening");
    axum::serve(listener, app(state)).await?;
    Ok(())
}
