#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use common::{Instrument, MarketDataProvider, PriceBar, Result, Timeframe};
use engine::Clock;

/// Clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock(AtomicI64);

impl ManualClock {
    pub fn new(start_ms: i64) -> Self {
        Self(AtomicI64::new(start_ms))
    }

    pub fn advance(&self, by: Duration) {
        self.0.fetch_add(by.as_millis() as i64, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> i64 {
        self.0.load(Ordering::SeqCst)
    }
}

/// In-process provider: replays scripted responses, then serves `rising_bars`.
pub struct FakeProvider {
    spacing: Duration,
    calls: AtomicUsize,
    script: Mutex<VecDeque<Result<Vec<PriceBar>>>>,
    /// Symbols that always fail with a 503.
    broken: Vec<String>,
}

impl FakeProvider {
    pub fn new() -> Self {
        Self::with_spacing(Duration::ZERO)
    }

    pub fn with_spacing(spacing: Duration) -> Self {
        Self {
            spacing,
            calls: AtomicUsize::new(0),
            script: Mutex::new(VecDeque::new()),
            broken: Vec::new(),
        }
    }

    pub fn broken_for(mut self, symbol: &str) -> Self {
        self.broken.push(symbol.to_string());
        self
    }

    pub fn push(&self, response: Result<Vec<PriceBar>>) {
        self.script.lock().unwrap().push_back(response);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MarketDataProvider for FakeProvider {
    fn name(&self) -> &str {
        "fake"
    }

    fn min_spacing(&self) -> Duration {
        self.spacing
    }

    async fn fetch_bars(
        &self,
        instrument: &Instrument,
        _timeframe: Timeframe,
        limit: usize,
    ) -> Result<Vec<PriceBar>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.broken.contains(&instrument.symbol) {
            return Err(common::Error::provider(Some(503), "service unavailable"));
        }
        let scripted = self.script.lock().unwrap().pop_front();
        scripted.unwrap_or_else(|| Ok(rising_bars(limit.min(120))))
    }
}

/// Hourly bars climbing one point per bar.
pub fn rising_bars(n: usize) -> Vec<PriceBar> {
    (0..n)
        .map(|i| {
            let c = 100.0 + i as f64;
            PriceBar::new(i as i64 * 3600, c - 0.5, c + 1.0, c - 1.0, c)
        })
        .collect()
}
