use std::time::Duration;

use async_trait::async_trait;

use crate::{Instrument, PriceBar, Result, Timeframe};

/// Abstraction over one upstream market-data source.
///
/// `BinanceKlines` implements this for crypto, `TwelveData` for FX, equities
/// and ETFs. Only the `MarketDataGateway` in `crates/engine` calls
/// `fetch_bars`; everything else reads series through the gateway so that
/// caching and rate limiting are never bypassed.
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    /// Short provider name for logs.
    fn name(&self) -> &str;

    /// Minimum spacing the provider's quota requires between two requests.
    fn min_spacing(&self) -> Duration;

    /// Fetch up to `limit` bars, oldest first, normalized to `PriceBar`.
    async fn fetch_bars(
        &self,
        instrument: &Instrument,
        timeframe: Timeframe,
        limit: usize,
    ) -> Result<Vec<PriceBar>>;
}

/// External generative-text service: accepts a prompt, returns prose.
#[async_trait]
pub trait NarrativeClient: Send + Sync {
    async fn summarize(&self, prompt: &str) -> Result<String>;
}
