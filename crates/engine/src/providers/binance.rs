use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use tracing::debug;

use common::{Error, Instrument, MarketDataProvider, PriceBar, Result, Timeframe};

use super::{get_json, http_client, parse_price};

const BASE_URL: &str = "https://api.binance.com";
/// Binance caps a single klines request at 1000 rows.
const MAX_LIMIT: usize = 1000;

/// Public klines endpoint for crypto pairs. No API key, no spacing requirement.
pub struct BinanceKlines {
    base_url: String,
    http: Client,
}

impl BinanceKlines {
    pub fn new() -> Result<Self> {
        Self::with_base_url(BASE_URL)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self> {
        Ok(Self {
            base_url: base_url.into(),
            http: http_client()?,
        })
    }

    fn interval(timeframe: Timeframe) -> &'static str {
        match timeframe {
            Timeframe::Hourly => "1h",
            Timeframe::Daily => "1d",
            Timeframe::Monthly => "1M",
        }
    }
}

#[async_trait]
impl MarketDataProvider for BinanceKlines {
    fn name(&self) -> &str {
        "binance"
    }

    fn min_spacing(&self) -> Duration {
        Duration::ZERO
    }

    async fn fetch_bars(
        &self,
        instrument: &Instrument,
        timeframe: Timeframe,
        limit: usize,
    ) -> Result<Vec<PriceBar>> {
        let url = format!("{}/api/v3/klines", self.base_url);
        let query = [
            ("symbol", instrument.symbol.clone()),
            ("interval", Self::interval(timeframe).to_string()),
            ("limit", limit.clamp(1, MAX_LIMIT).to_string()),
        ];

        debug!(symbol = %instrument.symbol, %timeframe, limit, "Requesting Binance klines");
        let rows: Vec<Vec<Value>> = get_json(&self.http, &url, &query).await?;
        parse_klines(&rows)
    }
}

// ─── Response parsing ─────────────────────────────────────────────────────────

/// Rows are `[openTimeMs, "open", "high", "low", "close", "volume", closeTimeMs, ...]`.
pub fn parse_klines(rows: &[Vec<Value>]) -> Result<Vec<PriceBar>> {
    rows.iter().map(|row| parse_kline(row)).collect()
}

fn parse_kline(row: &[Value]) -> Result<PriceBar> {
    if row.len() < 5 {
        return Err(Error::MalformedResponse(format!(
            "kline row has {} fields, expected at least 5",
            row.len()
        )));
    }
    let open_ms = row[0]
        .as_i64()
        .ok_or_else(|| Error::MalformedResponse(format!("kline open time is not an integer: {}", row[0])))?;

    Ok(PriceBar {
        time: open_ms / 1000,
        open: parse_price(&row[1], "open")?,
        high: parse_price(&row[2], "high")?,
        low: parse_price(&row[3], "low")?,
        close: parse_price(&row[4], "close")?,
    })
}
