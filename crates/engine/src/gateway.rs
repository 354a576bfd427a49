use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use common::{AssetClass, Error, Instrument, MarketDataProvider, Result, Series, Timeframe};

use crate::cache::{CacheEntry, CacheKey, Clock, SeriesCache, SystemClock};
use crate::limiter::RateLimiter;
use crate::retry::RetryPolicy;
use crate::store::CacheStore;

pub const RATE_LIMIT_ADVISORY: &str =
    "Upstream rate limit reached; some rows may show cached (stale) data.";

/// Where a returned series came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SeriesSource {
    Upstream,
    Cache,
    /// Expired entry served because the provider failed.
    StaleCache,
}

#[derive(Debug, Clone)]
pub struct SeriesFetch {
    pub series: Arc<Series>,
    pub source: SeriesSource,
}

/// Caching, retrying, rate-limited access to bar series.
///
/// The only component that calls `MarketDataProvider::fetch_bars`.
pub struct MarketDataGateway {
    providers: HashMap<AssetClass, Arc<dyn MarketDataProvider>>,
    cache: Arc<SeriesCache>,
    store: Option<CacheStore>,
    limiter: RateLimiter,
    retry: RetryPolicy,
    clock: Arc<dyn Clock>,
    rate_limited: AtomicBool,
    advisory_issued: AtomicBool,
}

impl MarketDataGateway {
    pub fn new(cache: Arc<SeriesCache>) -> Self {
        Self {
            providers: HashMap::new(),
            cache,
            store: None,
            limiter: RateLimiter::new(),
            retry: RetryPolicy::default(),
            clock: Arc::new(SystemClock),
            rate_limited: AtomicBool::new(false),
            advisory_issued: AtomicBool::new(false),
        }
    }

    /// Route `asset_class` to `provider`. Later registrations replace earlier ones.
    pub fn with_provider(mut self, asset_class: AssetClass, provider: Arc<dyn MarketDataProvider>) -> Self {
        self.providers.insert(asset_class, provider);
        self
    }

    pub fn with_store(mut self, store: CacheStore) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn cache(&self) -> &SeriesCache {
        &self.cache
    }

    pub fn has_provider(&self, asset_class: AssetClass) -> bool {
        self.providers.contains_key(&asset_class)
    }

    /// Fetch `lookback` bars, serving from cache while fresh.
    ///
    /// Retryable failures are retried with backoff; once retries are
    /// exhausted an expired cache entry is returned if one exists.
    pub async fn fetch_series(
        &self,
        instrument: &Instrument,
        timeframe: Timeframe,
        lookback: usize,
    ) -> Result<SeriesFetch> {
        let key = CacheKey::new(&instrument.symbol, timeframe);

        if let Some(series) = self.cache.get_fresh(&key, self.clock.now_ms()).await {
            debug!(key = %key, "Series cache hit");
            return Ok(SeriesFetch {
                series,
                source: SeriesSource::Cache,
            });
        }

        let provider: &dyn MarketDataProvider = self
            .providers
            .get(&instrument.asset_class)
            .ok_or(Error::NoProvider(instrument.asset_class))?
            .as_ref();

        match self.fetch_upstream(provider, instrument, timeframe, lookback).await {
            Ok(series) => {
                let series = Arc::new(series);
                self.store_entry(key, series.clone()).await;
                Ok(SeriesFetch {
                    series,
                    source: SeriesSource::Upstream,
                })
            }
            Err(e @ (Error::Provider { .. } | Error::RateLimitExceeded)) => {
                match self.cache.get(&key).await {
                    Some(stale) => {
                        warn!(key = %key, error = %e, "Provider failed, serving stale cache");
                        Ok(SeriesFetch {
                            series: stale.series,
                            source: SeriesSource::StaleCache,
                        })
                    }
                    None => Err(e),
                }
            }
            Err(e) => Err(e),
        }
    }

    async fn fetch_upstream(
        &self,
        provider: &dyn MarketDataProvider,
        instrument: &Instrument,
        timeframe: Timeframe,
        lookback: usize,
    ) -> Result<Series> {
        let label = format!("{}:{}|{}", provider.name(), instrument.symbol, timeframe);
        let this = self;

        let bars = self
            .retry
            .run(&label, move || async move {
                let result = this
                    .limiter
                    .run(
                        provider.name(),
                        provider.min_spacing(),
                        provider.fetch_bars(instrument, timeframe, lookback),
                    )
                    .await;
                if matches!(&result, Err(e) if e.is_rate_limit()) {
                    this.note_rate_limit();
                }
                result
            })
            .await?;

        debug!(symbol = %instrument.symbol, %timeframe, bars = bars.len(), "Fetched series");
        Series::new(instrument.symbol.clone(), timeframe, bars)
    }

    async fn store_entry(&self, key: CacheKey, series: Arc<Series>) {
        let entry = CacheEntry {
            series,
            fetched_at_ms: self.clock.now_ms(),
        };
        if let Some(store) = &self.store {
            if let Err(e) = store.put(&key, &entry).await {
                warn!(key = %key, error = %e, "Failed to persist cache entry");
            }
        }
        self.cache.insert(key, entry).await;
    }

    fn note_rate_limit(&self) {
        if !self.rate_limited.swap(true, Ordering::SeqCst) {
            warn!("{RATE_LIMIT_ADVISORY}");
        }
    }

    /// The rate-limit advisory, returned once after the first 429 and never again.
    pub fn take_advisory(&self) -> Option<String> {
        if !self.rate_limited.load(Ordering::SeqCst) {
            return None;
        }
        self.advisory_issued
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| {
                info!("Rate-limit advisory attached to scan report");
                RATE_LIMIT_ADVISORY.to_string()
            })
    }
}
