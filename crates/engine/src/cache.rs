use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::RwLock;

use common::{Series, Timeframe};

// ─── Clock ────────────────────────────────────────────────────────────────────

/// Wall-clock source for cache timestamps, in epoch milliseconds.
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> i64;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        Utc::now().timestamp_millis()
    }
}

// ─── Keys & entries ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub symbol: String,
    pub timeframe: Timeframe,
}

impl CacheKey {
    pub fn new(symbol: impl Into<String>, timeframe: Timeframe) -> Self {
        Self {
            symbol: symbol.into(),
            timeframe,
        }
    }

    /// Inverse of `Display`: `symbol|interval`.
    pub fn parse(s: &str) -> Option<Self> {
        let (symbol, interval) = s.rsplit_once('|')?;
        let timeframe = match interval {
            "1h" => Timeframe::Hourly,
            "1d" => Timeframe::Daily,
            "1month" => Timeframe::Monthly,
            _ => return None,
        };
        (!symbol.is_empty()).then(|| Self::new(symbol, timeframe))
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}|{}", self.symbol, self.timeframe.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub series: Arc<Series>,
    pub fetched_at_ms: i64,
}

impl CacheEntry {
    pub fn is_fresh(&self, now_ms: i64, ttl: Duration) -> bool {
        now_ms - self.fetched_at_ms < ttl.as_millis() as i64
    }
}

// ─── Cache ────────────────────────────────────────────────────────────────────

/// TTL cache of series keyed by `(symbol, timeframe)`.
///
/// Expiry is lazy: stale entries stay until overwritten so they can serve
/// as a fallback when the provider is down.
pub struct SeriesCache {
    ttl: Duration,
    entries: RwLock<HashMap<CacheKey, CacheEntry>>,
}

impl SeriesCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub async fn get(&self, key: &CacheKey) -> Option<CacheEntry> {
        self.entries.read().await.get(key).cloned()
    }

    /// The cached series, only if it is still within TTL.
    pub async fn get_fresh(&self, key: &CacheKey, now_ms: i64) -> Option<Arc<Series>> {
        self.get(key)
            .await
            .filter(|e| e.is_fresh(now_ms, self.ttl))
            .map(|e| e.series)
    }

    pub async fn insert(&self, key: CacheKey, entry: CacheEntry) {
        self.entries.write().await.insert(key, entry);
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::PriceBar;

    fn entry(at: i64) -> CacheEntry {
        let bars = vec![PriceBar::new(0, 1.0, 1.0, 1.0, 1.0)];
        CacheEntry {
            series: Arc::new(Series::new("BTCUSDT", Timeframe::Hourly, bars).unwrap()),
            fetched_at_ms: at,
        }
    }

    #[test]
    fn key_round_trips_through_display() {
        let key = CacheKey::new("EURUSD", Timeframe::Monthly);
        assert_eq!(key.to_string(), "EURUSD|1month");
        assert_eq!(CacheKey::parse("EURUSD|1month"), Some(key));
        assert_eq!(CacheKey::parse("EURUSD|5m"), None);
        assert_eq!(CacheKey::parse("|1h"), None);
    }

    #[test]
    fn freshness_is_strict_at_ttl() {
        let ttl = Duration::from_secs(60);
        let e = entry(1_000);
        assert!(e.is_fresh(60_999, ttl));
        assert!(!e.is_fresh(61_000, ttl));
    }

    #[tokio::test]
    async fn stale_entries_are_kept_but_not_fresh() {
        let cache = SeriesCache::new(Duration::from_secs(60));
        let key = CacheKey::new("BTCUSDT", Timeframe::Hourly);
        cache.insert(key.clone(), entry(0)).await;

        assert!(cache.get_fresh(&key, 30_000).await.is_some());
        assert!(cache.get_fresh(&key, 120_000).await.is_none());
        assert!(cache.get(&key).await.is_some());
    }
}
