use std::sync::Arc;

use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use common::{AssetClass, Config, MarketDataProvider, NarrativeClient};
use engine::{
    BinanceKlines, CacheStore, MarketDataGateway, OpenAiClient, ScanOptions, ScanTable, Scanner,
    SeriesCache, TwelveData,
};
use strategy::UniverseFile;

#[tokio::main]
async fn main() {
    // ── Logging ──────────────────────────────────────────────────────────────
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    // ── Config ────────────────────────────────────────────────────────────────
    let cfg = Config::from_env();
    let universe = UniverseFile::load(&cfg.universe_config_path)
        .unwrap_or_else(|e| panic!("Failed to load {}: {e}", cfg.universe_config_path));
    info!(
        instruments = universe.instruments.len(),
        ttl_secs = cfg.cache_ttl.as_secs(),
        "Swingscan starting"
    );

    // ── Series cache ──────────────────────────────────────────────────────────
    let cache = Arc::new(SeriesCache::new(cfg.cache_ttl));
    let store = CacheStore::connect(&cfg.database_url)
        .await
        .unwrap_or_else(|e| panic!("Failed to open cache database: {e}"));
    if let Err(e) = store.hydrate(&cache).await {
        warn!(error = %e, "Series cache hydration failed, starting cold");
    }

    // ── Market data providers ─────────────────────────────────────────────────
    let binance = BinanceKlines::new().unwrap_or_else(|e| panic!("HTTP client setup failed: {e}"));
    let mut gateway = MarketDataGateway::new(cache)
        .with_store(store)
        .with_provider(AssetClass::Crypto, Arc::new(binance));

    match cfg.twelvedata_api_key.as_deref() {
        Some(key) => {
            let twelve: Arc<dyn MarketDataProvider> = Arc::new(
                TwelveData::new(key, cfg.provider_min_spacing)
                    .unwrap_or_else(|e| panic!("HTTP client setup failed: {e}")),
            );
            for class in [AssetClass::Forex, AssetClass::Equity, AssetClass::Etf] {
                gateway = gateway.with_provider(class, twelve.clone());
            }
        }
        None => warn!("TWELVEDATA_API_KEY not set; forex, equity and ETF rows will be unavailable"),
    }

    // ── Scanner ───────────────────────────────────────────────────────────────
    let scanner = Scanner::new(
        Arc::new(gateway),
        universe.instruments,
        universe.params,
        ScanOptions::from_config(&cfg),
    );

    // ── Narrative summaries ───────────────────────────────────────────────────
    let narrative: Option<Arc<dyn NarrativeClient>> = match cfg.openai_api_key.as_deref() {
        Some(key) => match OpenAiClient::new(key, cfg.openai_model.clone()) {
            Ok(client) => Some(Arc::new(client)),
            Err(e) => {
                warn!(error = %e, "Narrative client unavailable");
                None
            }
        },
        None => None,
    };

    // ── Dashboard API ─────────────────────────────────────────────────────────
    let state = api::AppState {
        table: ScanTable::new(),
        scanner: Arc::new(scanner),
        narrative,
        dashboard_token: cfg.dashboard_token.clone(),
    };
    let generation = state.start_scan(None);
    info!(generation, "Initial scan started");

    let port = cfg.dashboard_port;
    tokio::spawn(async move {
        if let Err(e) = api::serve(state, port).await {
            error!(error = %e, "Dashboard API stopped");
        }
    });

    info!("All subsystems started. Waiting for shutdown signal.");
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for shutdown signal");
    }
    info!("Shutdown signal received. Exiting.");
}
