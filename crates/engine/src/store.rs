use std::sync::Arc;

use sqlx::SqlitePool;
use tracing::{info, warn};

use common::{PriceBar, Result, Series};

use crate::cache::{CacheEntry, CacheKey, SeriesCache};

/// SQLite write-through persistence for the series cache.
///
/// One row per `symbol|interval` key; `bars` is the JSON array of bars.
/// Rows are only ever overwritten, never deleted.
#[derive(Clone)]
pub struct CacheStore {
    db: SqlitePool,
}

impl CacheStore {
    pub async fn connect(database_url: &str) -> Result<Self> {
        let db = SqlitePool::connect(database_url).await?;
        let store = Self::from_pool(db);
        store.migrate().await?;
        Ok(store)
    }

    pub fn from_pool(db: SqlitePool) -> Self {
        Self { db }
    }

    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("../../migrations")
            .run(&self.db)
            .await
            .map_err(sqlx::Error::from)?;
        Ok(())
    }

    /// Upsert one entry.
    pub async fn put(&self, key: &CacheKey, entry: &CacheEntry) -> Result<()> {
        let bars = serde_json::to_string(entry.series.bars())?;
        sqlx::query(
            r#"
            INSERT INTO series_cache (cache_key, fetched_at_ms, bars)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(cache_key) DO UPDATE SET
                fetched_at_ms = excluded.fetched_at_ms,
                bars = excluded.bars
            "#,
        )
        .bind(key.to_string())
        .bind(entry.fetched_at_ms)
        .bind(bars)
        .execute(&self.db)
        .await?;
        Ok(())
    }

    /// Every stored entry. Rows that no longer decode are skipped.
    pub async fn load_all(&self) -> Result<Vec<(CacheKey, CacheEntry)>> {
        let rows: Vec<(String, i64, String)> =
            sqlx::query_as("SELECT cache_key, fetched_at_ms, bars FROM series_cache")
                .fetch_all(&self.db)
                .await?;

        let mut out = Vec::with_capacity(rows.len());
        for (raw_key, fetched_at_ms, bars) in rows {
            let Some(key) = CacheKey::parse(&raw_key) else {
                warn!(key = %raw_key, "Skipping cache row with unknown key");
                continue;
            };
            let series = serde_json::from_str::<Vec<PriceBar>>(&bars)
                .map_err(common::Error::from)
                .and_then(|bars| Series::new(key.symbol.clone(), key.timeframe, bars));
            match series {
                Ok(series) => out.push((
                    key,
                    CacheEntry {
                        series: Arc::new(series),
                        fetched_at_ms,
                    },
                )),
                Err(e) => warn!(key = %raw_key, error = %e, "Skipping undecodable cache row"),
            }
        }
        Ok(out)
    }

    /// Load every stored entry into `cache`. Returns the number loaded.
    pub async fn hydrate(&self, cache: &SeriesCache) -> Result<usize> {
        let entries = self.load_all().await?;
        let n = entries.len();
        for (key, entry) in entries {
            cache.insert(key, entry).await;
        }
        info!(entries = n, "Series cache hydrated from database");
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::Timeframe;
    use sqlx::sqlite::SqlitePoolOptions;
    use std::time::Duration;

    async fn memory_store() -> CacheStore {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        let store = CacheStore::from_pool(pool);
        store.migrate().await.unwrap();
        store
    }

    fn entry(close: f64, at: i64) -> CacheEntry {
        let bars = vec![
            PriceBar::new(0, 1.0, 2.0, 0.5, 1.5),
            PriceBar::new(3600, 1.5, close.max(1.5), 1.0, close),
        ];
        CacheEntry {
            series: Arc::new(Series::new("AAPL", Timeframe::Daily, bars).unwrap()),
            fetched_at_ms: at,
        }
    }

    #[tokio::test]
    async fn put_then_load_round_trips() {
        let store = memory_store().await;
        let key = CacheKey::new("AAPL", Timeframe::Daily);
        store.put(&key, &entry(1.8, 1_000)).await.unwrap();

        let loaded = store.load_all().await.unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].0, key);
        assert_eq!(loaded[0].1.fetched_at_ms, 1_000);
        assert_eq!(loaded[0].1.series.last_close(), Some(1.8));
    }

    #[tokio::test]
    async fn put_overwrites_existing_key() {
        let store = memory_store().await;
        let key = CacheKey::new("AAPL", Timeframe::Daily);
        store.put(&key, &entry(1.8, 1_000)).await.unwrap();
        store.put(&key, &entry(1.9, 2_000)).await.unwrap();

        let loaded = store.load_all().await.unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].1.fetched_at_ms, 2_000);
        assert_eq!(loaded[0].1.series.last_close(), Some(1.9));
    }

    #[tokio::test]
    async fn hydrate_fills_memory_cache() {
        let store = memory_store().await;
        store
            .put(&CacheKey::new("AAPL", Timeframe::Daily), &entry(1.8, 1_000))
            .await
            .unwrap();
        sqlx::query("INSERT INTO series_cache VALUES ('garbage', 0, '[]')")
            .execute(&store.db)
            .await
            .unwrap();

        let cache = SeriesCache::new(Duration::from_secs(1800));
        assert_eq!(store.hydrate(&cache).await.unwrap(), 1);
        assert_eq!(cache.len().await, 1);
    }
}
