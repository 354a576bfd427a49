//! Moving-average cross detection on open prices.
//!
//! A golden cross is the bar where the fast SMA moves strictly above the slow
//! SMA after sitting at or below it; a death cross is the mirror image.

use serde::Serialize;

use common::{Direction, PriceBar};

use crate::indicators::sma;

/// Indices of the most recent golden and death crosses in a series.
/// Recomputed whenever the series changes length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct CrossState {
    pub last_golden: Option<usize>,
    pub last_death: Option<usize>,
}

/// An established trend: its direction and the cross that started it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Trend {
    pub direction: Direction,
    /// Index of the cross that established `direction`.
    pub cross_index: usize,
    /// Index of the last cross in the opposite direction, if any.
    pub opposite_index: Option<usize>,
}

impl CrossState {
    /// `Up` iff the last golden cross is later than the last death cross.
    pub fn direction(&self) -> Option<Direction> {
        match (self.last_golden, self.last_death) {
            (Some(g), Some(d)) if g > d => Some(Direction::Up),
            (Some(_), Some(_)) => Some(Direction::Down),
            (Some(_), None) => Some(Direction::Up),
            (None, Some(_)) => Some(Direction::Down),
            (None, None) => None,
        }
    }

    /// The governing trend, or `None` when no usable cross exists
    /// ("no trend established").
    pub fn trend(&self) -> Option<Trend> {
        let direction = self.direction()?;
        let (cross_index, opposite_index) = match direction {
            Direction::Up => (self.last_golden?, self.last_death),
            Direction::Down => (self.last_death?, self.last_golden),
        };
        if cross_index < 2 {
            return None;
        }
        Some(Trend {
            direction,
            cross_index,
            opposite_index,
        })
    }
}

/// Fast/slow SMA cross detector. Defaults to 50/200.
#[derive(Debug, Clone)]
pub struct TrendCrossDetector {
    pub fast: usize,
    pub slow: usize,
}

impl Default for TrendCrossDetector {
    fn default() -> Self {
        Self::new(50, 200)
    }
}

impl TrendCrossDetector {
    pub fn new(fast: usize, slow: usize) -> Self {
        assert!(fast >= 1, "fast SMA period must be >= 1");
        assert!(fast < slow, "fast SMA period must be less than slow period");
        Self { fast, slow }
    }

    pub fn detect(&self, bars: &[PriceBar]) -> CrossState {
        let opens: Vec<f64> = bars.iter().map(|b| b.open).collect();
        self.detect_on(&opens)
    }

    /// Scan a precomputed open-price projection.
    pub fn detect_on(&self, opens: &[f64]) -> CrossState {
        let fast = sma(opens, self.fast);
        let slow = sma(opens, self.slow);
        let mut state = CrossState::default();

        for i in 1..opens.len() {
            // Only bars where both averages exist on this bar and the previous one.
            let (Some(f), Some(s), Some(fp), Some(sp)) = (fast[i], slow[i], fast[i - 1], slow[i - 1])
            else {
                continue;
            };

            if f > s && fp <= sp {
                state.last_golden = Some(i);
            } else if f < s && fp >= sp {
                state.last_death = Some(i);
            }
        }
        state
    }
}
