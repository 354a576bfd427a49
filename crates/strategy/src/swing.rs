//! Swing and fractal pivot search.
//!
//! The pre-swing pivot is the most extreme bar leading into a cross; the
//! post-cross pivot is the first 5-bar fractal in the trend direction after it.

use serde::Serialize;

use common::{Direction, PriceBar};

use crate::trend::Trend;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum PivotRole {
    PreSwingExtreme,
    PostCrossFractal,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Pivot {
    pub index: usize,
    pub time: i64,
    pub price: f64,
    pub role: PivotRole,
}

impl Pivot {
    /// Pre-swing pivots are priced at the low in an uptrend, the high in a downtrend.
    pub fn pre_swing(bars: &[PriceBar], index: usize, direction: Direction) -> Self {
        let bar = &bars[index];
        Self {
            index,
            time: bar.time,
            price: match direction {
                Direction::Up => bar.low,
                Direction::Down => bar.high,
            },
            role: PivotRole::PreSwingExtreme,
        }
    }

    /// Post-cross fractals are priced at the high in an uptrend, the low in a downtrend.
    pub fn post_cross(bars: &[PriceBar], index: usize, direction: Direction) -> Self {
        let bar = &bars[index];
        Self {
            index,
            time: bar.time,
            price: match direction {
                Direction::Up => bar.high,
                Direction::Down => bar.low,
            },
            role: PivotRole::PostCrossFractal,
        }
    }
}

/// Result of locating a pivot pair for a trend.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum PivotSearch {
    Found { pre: Pivot, post: Pivot },
    /// No qualifying fractal yet; wait for more bars.
    Pending { pre: Pivot },
}

/// `high[i]` strictly exceeds the two highs on each side.
pub fn is_high_fractal(bars: &[PriceBar], i: usize) -> bool {
    if i < 2 || i + 2 >= bars.len() {
        return false;
    }
    let h = bars[i].high;
    h > bars[i - 1].high && h > bars[i - 2].high && h > bars[i + 1].high && h > bars[i + 2].high
}

/// `low[i]` is strictly below the two lows on each side.
pub fn is_low_fractal(bars: &[PriceBar], i: usize) -> bool {
    if i < 2 || i + 2 >= bars.len() {
        return false;
    }
    let l = bars[i].low;
    l < bars[i - 1].low && l < bars[i - 2].low && l < bars[i + 1].low && l < bars[i + 2].low
}

/// Most extreme bar in `[start, end]`: minimal low for up, maximal high for down.
/// Ties keep the earliest bar.
pub fn pre_swing_pivot(
    bars: &[PriceBar],
    direction: Direction,
    start: usize,
    end: usize,
) -> Option<Pivot> {
    if bars.is_empty() || start > end {
        return None;
    }
    let end = end.min(bars.len() - 1);
    let mut best = start.min(end);

    for i in best..=end {
        let better = match direction {
            Direction::Up => bars[i].low < bars[best].low,
            Direction::Down => bars[i].high > bars[best].high,
        };
        if better {
            best = i;
        }
    }
    Some(Pivot::pre_swing(bars, best, direction))
}

/// First fractal in the trend direction, scanning from `from + 2`.
/// A fractal needs two bars on its right, so the scan stops at `len - 2`.
pub fn post_cross_fractal(bars: &[PriceBar], direction: Direction, from: usize) -> Option<Pivot> {
    let first = from.checked_add(2)?;
    let last = bars.len().saturating_sub(2);

    (first..last)
        .find(|&i| match direction {
            Direction::Up => is_high_fractal(bars, i),
            Direction::Down => is_low_fractal(bars, i),
        })
        .map(|i| Pivot::post_cross(bars, i, direction))
}

/// Locate the pivot pair for `trend`. The pre-swing window runs from the last
/// opposite cross (or the first bar) to the trend's own cross.
pub fn locate(bars: &[PriceBar], trend: &Trend) -> Option<PivotSearch> {
    let start = trend.opposite_index.unwrap_or(0);
    let pre = pre_swing_pivot(bars, trend.direction, start, trend.cross_index)?;

    Some(match post_cross_fractal(bars, trend.direction, trend.cross_index) {
        Some(post) => PivotSearch::Found { pre, post },
        None => PivotSearch::Pending { pre },
    })
}
