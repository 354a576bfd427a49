use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// One OHLC bar. `time` is the bar open time in unix seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    pub time: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

impl PriceBar {
    pub fn new(time: i64, open: f64, high: f64, low: f64, close: f64) -> Self {
        Self { time, open, high, low, close }
    }

    /// `low <= min(open, close) <= max(open, close) <= high`, all finite.
    pub fn is_valid(&self) -> bool {
        let finite = [self.open, self.high, self.low, self.close]
            .iter()
            .all(|v| v.is_finite());
        finite
            && self.low <= self.open.min(self.close)
            && self.open.max(self.close) <= self.high
    }
}

/// Bar interval requested from a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Timeframe {
    Hourly,
    Daily,
    Monthly,
}

impl Timeframe {
    /// Canonical interval label, used in cache keys.
    pub fn as_str(&self) -> &'static str {
        match self {
            Timeframe::Hourly => "1h",
            Timeframe::Daily => "1d",
            Timeframe::Monthly => "1month",
        }
    }
}

impl std::fmt::Display for Timeframe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Explicit routing tag attached to every symbol at configuration time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetClass {
    Crypto,
    Forex,
    Equity,
    Etf,
}

impl std::fmt::Display for AssetClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AssetClass::Crypto => write!(f, "crypto"),
            AssetClass::Forex => write!(f, "forex"),
            AssetClass::Equity => write!(f, "equity"),
            AssetClass::Etf => write!(f, "etf"),
        }
    }
}

/// A tradable symbol together with its resolved asset class.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Instrument {
    pub symbol: String,
    pub asset_class: AssetClass,
}

impl Instrument {
    pub fn new(symbol: impl Into<String>, asset_class: AssetClass) -> Self {
        Self {
            symbol: symbol.into(),
            asset_class,
        }
    }
}

/// Ordered bars for one (symbol, timeframe) pair, strictly increasing `time`.
///
/// Bars are shared behind an `Arc` so the gateway can hand out read-only
/// views without copying.
#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    pub symbol: String,
    pub timeframe: Timeframe,
    bars: Arc<[PriceBar]>,
}

impl Series {
    /// Validate and wrap a bar list. Fails with `MalformedResponse` when a bar
    /// breaks the OHLC invariant or times are not strictly increasing.
    pub fn new(symbol: impl Into<String>, timeframe: Timeframe, bars: Vec<PriceBar>) -> Result<Self> {
        let symbol = symbol.into();
        if let Some(bad) = bars.iter().position(|b| !b.is_valid()) {
            return Err(Error::MalformedResponse(format!(
                "{symbol} {timeframe}: bar {bad} violates OHLC ordering"
            )));
        }
        if let Some(w) = bars.windows(2).position(|w| w[1].time <= w[0].time) {
            return Err(Error::MalformedResponse(format!(
                "{symbol} {timeframe}: bar {} is not after bar {w}",
                w + 1
            )));
        }
        Ok(Self {
            symbol,
            timeframe,
            bars: bars.into(),
        })
    }

    pub fn empty(symbol: impl Into<String>, timeframe: Timeframe) -> Self {
        Self {
            symbol: symbol.into(),
            timeframe,
            bars: Arc::from(Vec::new()),
        }
    }

    pub fn bars(&self) -> &[PriceBar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn opens(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.open).collect()
    }

    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.close).collect()
    }

    pub fn last_close(&self) -> Option<f64> {
        self.bars.last().map(|b| b.close)
    }
}

/// Higher-timeframe directional bias.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Bias {
    Bullish,
    Bearish,
}

impl std::fmt::Display for Bias {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Bias::Bullish => write!(f, "bullish"),
            Bias::Bearish => write!(f, "bearish"),
        }
    }
}

/// Lower-timeframe entry signal, gated by `Bias`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum Entry {
    ConfirmedBuy,
    ConfirmedSell,
    #[default]
    Wait,
}

impl std::fmt::Display for Entry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Entry::ConfirmedBuy => write!(f, "confirmed-buy"),
            Entry::ConfirmedSell => write!(f, "confirmed-sell"),
            Entry::Wait => write!(f, "wait"),
        }
    }
}

/// Trend direction derived from the moving-average cross.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    Down,
}

impl Direction {
    /// True when `price` has traded at or through `level` in this direction.
    pub fn reached(&self, price: f64, level: f64) -> bool {
        match self {
            Direction::Up => price >= level,
            Direction::Down => price <= level,
        }
    }

    /// `+1.0` for up, `-1.0` for down.
    pub fn sign(&self) -> f64 {
        match self {
            Direction::Up => 1.0,
            Direction::Down => -1.0,
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::Up => write!(f, "up"),
            Direction::Down => write!(f, "down"),
        }
    }
}

/// Data quality marker for a scan row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "detail", rename_all = "lowercase")]
pub enum RowStatus {
    Fresh,
    /// At least one series came from an expired cache entry after upstream failure.
    Stale,
    Unavailable(String),
}

/// One line of the scan result table. Rebuilt on every scan pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanRow {
    pub symbol: String,
    pub asset_class: AssetClass,
    pub bias: Option<Bias>,
    pub entry: Entry,
    /// Short-term Fibonacci target (hourly).
    pub target: Option<f64>,
    /// Long-term Fibonacci target (daily).
    pub daily_target: Option<f64>,
    pub projected_annual_return: Option<f64>,
    /// Fibonacci trend direction of the target, when a trend is established.
    pub trend: Option<Direction>,
    /// EMA bias and Fibonacci trend are both known and disagree.
    pub gating_conflict: bool,
    pub status: RowStatus,
}

impl ScanRow {
    pub fn unavailable(instrument: &Instrument, reason: impl Into<String>) -> Self {
        Self {
            symbol: instrument.symbol.clone(),
            asset_class: instrument.asset_class,
            bias: None,
            entry: Entry::Wait,
            target: None,
            daily_target: None,
            projected_annual_return: None,
            trend: None,
            gating_conflict: false,
            status: RowStatus::Unavailable(reason.into()),
        }
    }

    /// Rows with no bias and no entry carry nothing to act on.
    pub fn is_actionable(&self) -> bool {
        !(self.entry == Entry::Wait && self.bias.is_none())
    }
}

/// A completed scan pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanReport {
    pub generation: u64,
    pub filter: Option<String>,
    pub rows: Vec<ScanRow>,
    /// One-shot advisory shown the first time the upstream rate limit was hit.
    pub advisory: Option<String>,
    pub completed_at: DateTime<Utc>,
}
