use std::time::Duration;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use common::{AssetClass, Error, Instrument, MarketDataProvider, PriceBar, Result, Timeframe};

use super::{get_json, http_client, parse_price};

const BASE_URL: &str = "https://api.twelvedata.com";
const MAX_OUTPUT_SIZE: usize = 5000;

/// Twelve Data `time_series` for FX, equities and ETFs.
///
/// The free quota is tight, so `min_spacing` is honoured by the gateway's
/// limiter for every request.
pub struct TwelveData {
    api_key: String,
    base_url: String,
    min_spacing: Duration,
    http: Client,
}

impl TwelveData {
    pub fn new(api_key: impl Into<String>, min_spacing: Duration) -> Result<Self> {
        Ok(Self {
            api_key: api_key.into(),
            base_url: BASE_URL.to_string(),
            min_spacing,
            http: http_client()?,
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn interval(timeframe: Timeframe) -> &'static str {
        match timeframe {
            Timeframe::Hourly => "1h",
            Timeframe::Daily => "1day",
            Timeframe::Monthly => "1month",
        }
    }
}

/// Provider symbol for an instrument: FX pairs are sent as `BASE/QUOTE`.
pub fn provider_symbol(instrument: &Instrument) -> String {
    let s = instrument.symbol.as_str();
    match instrument.asset_class {
        AssetClass::Forex if s.len() == 6 && s.is_ascii() && !s.contains('/') => {
            format!("{}/{}", &s[..3], &s[3..])
        }
        _ => s.to_string(),
    }
}

#[async_trait]
impl MarketDataProvider for TwelveData {
    fn name(&self) -> &str {
        "twelvedata"
    }

    fn min_spacing(&self) -> Duration {
        self.min_spacing
    }

    async fn fetch_bars(
        &self,
        instrument: &Instrument,
        timeframe: Timeframe,
        limit: usize,
    ) -> Result<Vec<PriceBar>> {
        let url = format!("{}/time_series", self.base_url);
        let symbol = provider_symbol(instrument);
        let query = [
            ("symbol", symbol.clone()),
            ("interval", Self::interval(timeframe).to_string()),
            ("outputsize", limit.clamp(1, MAX_OUTPUT_SIZE).to_string()),
            ("timezone", "UTC".to_string()),
            ("apikey", self.api_key.clone()),
        ];

        debug!(symbol = %symbol, %timeframe, limit, "Requesting Twelve Data time series");
        let resp: TimeSeriesResponse = get_json(&self.http, &url, &query).await?;
        parse_time_series(resp)
    }
}

// ─── Response types ───────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct TimeSeriesResponse {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    code: Option<u16>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    values: Vec<TimeSeriesValue>,
}

#[derive(Debug, Deserialize)]
struct TimeSeriesValue {
    datetime: String,
    open: Value,
    high: Value,
    low: Value,
    close: Value,
}

/// Error payloads become provider errors; values arrive newest first and are
/// returned oldest first.
pub fn parse_time_series(resp: TimeSeriesResponse) -> Result<Vec<PriceBar>> {
    if resp.status.as_deref() == Some("error") {
        let message = resp.message.unwrap_or_else(|| "unknown error".to_string());
        return Err(match resp.code {
            Some(429) => Error::RateLimitExceeded,
            code => Error::provider(code, message),
        });
    }

    let mut bars = resp
        .values
        .iter()
        .map(|v| {
            Ok(PriceBar {
                time: parse_datetime(&v.datetime)?,
                open: parse_price(&v.open, "open")?,
                high: parse_price(&v.high, "high")?,
                low: parse_price(&v.low, "low")?,
                close: parse_price(&v.close, "close")?,
            })
        })
        .collect::<Result<Vec<_>>>()?;
    bars.reverse();
    Ok(bars)
}

/// `YYYY-MM-DD HH:MM:SS` for intraday bars, `YYYY-MM-DD` otherwise. UTC.
fn parse_datetime(s: &str) -> Result<i64> {
    if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Ok(dt.and_utc().timestamp());
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc().timestamp())
        .ok_or_else(|| Error::MalformedResponse(format!("unrecognised datetime '{s}'")))
}
