use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures_util::future::join_all;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use common::{Error, Instrument, Result, RowStatus, ScanReport, ScanRow, Series, Timeframe};
use strategy::{EngineParams, Evaluator, SymbolContext};

use crate::gateway::{MarketDataGateway, SeriesSource};
use crate::table::ScanTable;

/// Batching and output limits for one scan pass.
#[derive(Debug, Clone)]
pub struct ScanOptions {
    pub batch_size: usize,
    pub batch_pause: Duration,
    /// Pause after a batch in which a symbol was unavailable.
    pub failure_pause: Duration,
    /// Row cap when no filter is active.
    pub max_unfiltered_rows: usize,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            batch_size: 5,
            batch_pause: Duration::from_secs(5),
            failure_pause: Duration::from_secs(10),
            max_unfiltered_rows: 20,
        }
    }
}

impl ScanOptions {
    pub fn from_config(cfg: &common::Config) -> Self {
        Self {
            batch_size: cfg.scan_batch_size.max(1),
            batch_pause: cfg.scan_batch_pause,
            failure_pause: cfg.scan_batch_pause * 2,
            ..Self::default()
        }
    }
}

/// Drives the evaluation pipeline across the symbol universe.
pub struct Scanner {
    gateway: Arc<MarketDataGateway>,
    universe: Vec<Instrument>,
    params: EngineParams,
    evaluator: Evaluator,
    options: ScanOptions,
    /// Daily and hourly target memory per symbol, carried between scans.
    contexts: Mutex<HashMap<String, SymbolContext>>,
}

impl Scanner {
    pub fn new(
        gateway: Arc<MarketDataGateway>,
        universe: Vec<Instrument>,
        params: EngineParams,
        options: ScanOptions,
    ) -> Self {
        let evaluator = Evaluator::new(&params);
        Self {
            gateway,
            universe,
            params,
            evaluator,
            options,
            contexts: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_evaluator(mut self, evaluator: Evaluator) -> Self {
        self.evaluator = evaluator;
        self
    }

    pub fn universe(&self) -> &[Instrument] {
        &self.universe
    }

    pub fn gateway(&self) -> &MarketDataGateway {
        &self.gateway
    }

    /// Symbols matching `filter` (case-insensitive substring), or all of them.
    pub fn select(&self, filter: Option<&str>) -> Vec<&Instrument> {
        match normalize_filter(filter) {
            Some(q) => self
                .universe
                .iter()
                .filter(|i| i.symbol.to_uppercase().contains(&q))
                .collect(),
            None => self.universe.iter().collect(),
        }
    }

    /// Run one pass and return the report stamped with `generation`.
    ///
    /// Unfiltered passes stop once `max_unfiltered_rows` actionable rows are
    /// collected and drop rows with nothing to act on. Filtered passes keep
    /// every match.
    pub async fn scan(&self, filter: Option<&str>, generation: u64) -> ScanReport {
        let filter = normalize_filter(filter);
        let unfiltered = filter.is_none();
        let selected = self.select(filter.as_deref());
        info!(generation, symbols = selected.len(), filter = ?filter, "Scan started");

        let mut rows = Vec::new();
        let batches: Vec<_> = selected.chunks(self.options.batch_size.max(1)).collect();
        let last_batch = batches.len().saturating_sub(1);

        for (n, batch) in batches.into_iter().enumerate() {
            // Results come back in request order.
            let batch_rows = join_all(batch.iter().map(|i| self.scan_one(i))).await;
            let had_failure = batch_rows
                .iter()
                .any(|r| matches!(r.status, RowStatus::Unavailable(_)));

            if unfiltered {
                rows.extend(batch_rows.into_iter().filter(ScanRow::is_actionable));
                if rows.len() >= self.options.max_unfiltered_rows {
                    rows.truncate(self.options.max_unfiltered_rows);
                    debug!(generation, "Row cap reached, ending scan early");
                    break;
                }
            } else {
                rows.extend(batch_rows);
            }

            if n < last_batch {
                let pause = if had_failure {
                    self.options.failure_pause
                } else {
                    self.options.batch_pause
                };
                tokio::time::sleep(pause).await;
            }
        }

        info!(generation, rows = rows.len(), "Scan finished");
        ScanReport {
            generation,
            filter,
            rows,
            advisory: None,
            completed_at: Utc::now(),
        }
    }

    /// Scan and hand the report to `table`. The rate-limit advisory is
    /// attached only if the table accepts the report.
    pub async fn scan_into(&self, table: &ScanTable, filter: Option<&str>, generation: u64) -> bool {
        let report = self.scan(filter, generation).await;
        table
            .apply_with(report, || self.gateway.take_advisory())
            .await
    }

    /// Evaluate one symbol. Failures become an `Unavailable` row.
    pub async fn scan_one(&self, instrument: &Instrument) -> ScanRow {
        match self.try_scan_one(instrument).await {
            Ok(row) => row,
            Err(e) => {
                warn!(symbol = %instrument.symbol, error = %e, "Symbol unavailable");
                ScanRow::unavailable(instrument, e.to_string())
            }
        }
    }

    async fn try_scan_one(&self, instrument: &Instrument) -> Result<ScanRow> {
        let mut stale = false;
        let daily = self
            .series(instrument, Timeframe::Daily, self.params.daily_lookback, &mut stale)
            .await?;
        let hourly = self
            .series(instrument, Timeframe::Hourly, self.params.hourly_lookback, &mut stale)
            .await?;
        let monthly = match self
            .series(instrument, Timeframe::Monthly, self.params.monthly_lookback, &mut stale)
            .await
        {
            Ok(s) => s,
            Err(e) => {
                debug!(symbol = %instrument.symbol, error = %e, "Monthly series unavailable, no projection");
                Arc::new(Series::empty(&instrument.symbol, Timeframe::Monthly))
            }
        };

        let mut ctx = self
            .contexts
            .lock()
            .await
            .remove(&instrument.symbol)
            .unwrap_or_default();
        let evaluation = self.evaluator.evaluate(&daily, &hourly, &monthly, &mut ctx);
        self.contexts.lock().await.insert(instrument.symbol.clone(), ctx);

        let status = if stale { RowStatus::Stale } else { RowStatus::Fresh };
        Ok(evaluation.into_row(instrument, status))
    }

    /// A malformed payload counts as an empty series.
    async fn series(
        &self,
        instrument: &Instrument,
        timeframe: Timeframe,
        lookback: usize,
        stale: &mut bool,
    ) -> Result<Arc<Series>> {
        match self.gateway.fetch_series(instrument, timeframe, lookback).await {
            Ok(fetch) => {
                *stale |= fetch.source == SeriesSource::StaleCache;
                Ok(fetch.series)
            }
            Err(Error::MalformedResponse(msg)) => {
                warn!(symbol = %instrument.symbol, %timeframe, "Malformed response treated as empty: {msg}");
                Ok(Arc::new(Series::empty(&instrument.symbol, timeframe)))
            }
            Err(e) => Err(e),
        }
    }
}

fn normalize_filter(filter: Option<&str>) -> Option<String> {
    filter
        .map(str::trim)
        .filter(|q| !q.is_empty())
        .map(str::to_uppercase)
}
