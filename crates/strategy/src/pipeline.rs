//! One-symbol evaluation: signal, trend, target and projected return.

use serde::Serialize;
use tracing::debug;

use common::{Direction, Instrument, PriceBar, RowStatus, ScanRow, Series};

use crate::config::EngineParams;
use crate::fib::{FibTargetCalculator, TargetOutcome, TargetState};
use crate::projection::cagr;
use crate::signal::{SignalComposer, SignalState};
use crate::swing::{locate, Pivot};
use crate::trend::{Trend, TrendCrossDetector};

/// Caller-owned target memory for one (symbol, timeframe) context.
///
/// Carries the last resolved pivot pair across evaluations so the target
/// keeps rolling forward instead of being re-derived from the cross.
/// `generation` counts evaluations that touched this context.
#[derive(Debug, Clone, Default)]
pub struct TargetContext {
    state: Option<TargetState>,
    generation: u64,
}

impl TargetContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn state(&self) -> Option<&TargetState> {
        self.state.as_ref()
    }

    /// Re-index the remembered pivots against `bars` by bar time.
    /// `None` when either pivot has scrolled out of the window.
    fn reanchor(&self, bars: &[PriceBar], direction: Direction) -> Option<TargetState> {
        let prev = self.state.as_ref().filter(|s| s.direction == direction)?;
        let find = |p: &Pivot| bars.iter().position(|b| b.time == p.time);
        let (pre_idx, post_idx) = (find(&prev.pre)?, find(&prev.post)?);

        let mut state = prev.clone();
        state.pre.index = pre_idx;
        state.post.index = post_idx;
        Some(state)
    }
}

/// Target memory for both timeframes of one symbol.
#[derive(Debug, Clone, Default)]
pub struct SymbolContext {
    pub daily: TargetContext,
    pub hourly: TargetContext,
}

/// Everything derived for one symbol in one pass.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Evaluation {
    pub signal: SignalState,
    /// Hourly trend, the one the entry signal trades.
    pub trend: Option<Trend>,
    pub target: TargetOutcome,
    /// Long-term target from the daily series.
    pub daily_target: TargetOutcome,
    pub projected_annual_return: Option<f64>,
}

impl Evaluation {
    /// The EMA bias and the Fibonacci trend are both established and point
    /// in opposite directions. Entry gating still follows the bias.
    pub fn gating_conflict(&self) -> bool {
        use common::Bias;
        match (self.signal.bias, self.trend.map(|t| t.direction)) {
            (Some(Bias::Bullish), Some(Direction::Down)) => true,
            (Some(Bias::Bearish), Some(Direction::Up)) => true,
            _ => false,
        }
    }

    pub fn into_row(self, instrument: &Instrument, status: RowStatus) -> ScanRow {
        ScanRow {
            symbol: instrument.symbol.clone(),
            asset_class: instrument.asset_class,
            bias: self.signal.bias,
            entry: self.signal.entry,
            target: self.target.target(),
            daily_target: self.daily_target.target(),
            projected_annual_return: self.projected_annual_return,
            trend: self.trend.map(|t| t.direction),
            gating_conflict: self.gating_conflict(),
            status,
        }
    }
}

/// The full per-symbol pipeline, parameterized once from `EngineParams`.
#[derive(Debug, Clone)]
pub struct Evaluator {
    detector: TrendCrossDetector,
    composer: SignalComposer,
    calculator: FibTargetCalculator,
}

impl Default for Evaluator {
    fn default() -> Self {
        Self::new(&EngineParams::default())
    }
}

impl Evaluator {
    pub fn new(params: &EngineParams) -> Self {
        Self {
            detector: TrendCrossDetector::new(params.fast_sma, params.slow_sma),
            composer: SignalComposer::new(params.bias_ema, params.rsi_period, params.rsi_smoothing),
            calculator: FibTargetCalculator::new(),
        }
    }

    pub fn with_parts(
        detector: TrendCrossDetector,
        composer: SignalComposer,
        calculator: FibTargetCalculator,
    ) -> Self {
        Self {
            detector,
            composer,
            calculator,
        }
    }

    /// Bias and long-term target on `daily`, entry and short-term target on
    /// `hourly`, CAGR on `monthly`.
    pub fn evaluate(
        &self,
        daily: &Series,
        hourly: &Series,
        monthly: &Series,
        ctx: &mut SymbolContext,
    ) -> Evaluation {
        let signal = self.composer.compose(&daily.closes(), &hourly.closes());
        let (trend, target) = self.target(hourly.bars(), &mut ctx.hourly);
        let (_, daily_target) = self.target(daily.bars(), &mut ctx.daily);

        Evaluation {
            signal,
            trend,
            target,
            daily_target,
            projected_annual_return: cagr(&monthly.closes()),
        }
    }

    /// Trend and settled target for `bars`, updating `ctx`.
    pub fn target(&self, bars: &[PriceBar], ctx: &mut TargetContext) -> (Option<Trend>, TargetOutcome) {
        ctx.generation += 1;

        let Some(trend) = self.detector.detect(bars).trend() else {
            debug!("No trend established, skipping target");
            ctx.state = None;
            return (None, TargetOutcome::NoTrend);
        };

        let outcome = match ctx.reanchor(bars, trend.direction) {
            // The remembered pair must still belong to the current trend.
            Some(prev) if prev.pre.index >= trend.opposite_index.unwrap_or(0) => {
                // Selection runs over every bar after q, including new ones.
                let mut state = self.calculator.compute(bars, prev.pre, prev.post, trend.direction);
                state.pivot_pair_generation = prev.pivot_pair_generation;
                self.calculator.settle(bars, state)
            }
            _ => match locate(bars, &trend) {
                Some(search) => self.calculator.resolve(bars, search, trend.direction),
                None => TargetOutcome::NoTrend,
            },
        };

        ctx.state = outcome.state().cloned();
        (Some(trend), outcome)
    }
}
